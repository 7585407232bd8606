use anyhow::{Result, bail};
use keyfort::Passphrase;
use std::io::{self, BufRead, IsTerminal};
use zeroize::Zeroizing;

pub fn read_passphrase() -> Result<Passphrase> {
    //  Environment variable
    //  KEYFORT_PASSPHRASE="supersecret" keyfort list
    if let Ok(pw) = std::env::var("KEYFORT_PASSPHRASE") {
        if !pw.is_empty() {
            let pw = Zeroizing::new(pw);
            return Ok(Passphrase::new(&pw)?);
        }
    }

    //  stdin (pipeline)
    //  printf "%s" "$PASS" | keyfort list
    if !io::stdin().is_terminal() {
        let mut buf = Zeroizing::new(String::new());
        io::stdin().lock().read_line(&mut buf)?;
        trim_newline(&mut buf);
        if !buf.is_empty() {
            return Ok(Passphrase::new(&buf)?);
        }
    }

    //  Interactive (TTY)
    if io::stdin().is_terminal() {
        let pw = Zeroizing::new(rpassword::prompt_password("Passphrase: ")?);
        if !pw.is_empty() {
            return Ok(Passphrase::new(&pw)?);
        }
    }

    bail!("no passphrase provided")
}

pub fn read_new_passphrase_with_confirmation() -> Result<Passphrase> {
    if !io::stdin().is_terminal() {
        let stdin = io::stdin();
        let mut handle = stdin.lock();

        let mut pw1 = Zeroizing::new(String::new());
        let mut pw2 = Zeroizing::new(String::new());

        handle.read_line(&mut pw1)?;
        handle.read_line(&mut pw2)?;

        trim_newline(&mut pw1);
        trim_newline(&mut pw2);

        if pw1.is_empty() {
            bail!("passphrase cannot be empty");
        }
        if *pw1 != *pw2 {
            bail!("passphrases do not match");
        }

        return Ok(Passphrase::new(&pw1)?);
    }

    let pw1 = Zeroizing::new(rpassword::prompt_password("New passphrase: ")?);
    let pw2 = Zeroizing::new(rpassword::prompt_password("Confirm passphrase: ")?);

    if pw1.is_empty() {
        bail!("passphrase cannot be empty");
    }
    if *pw1 != *pw2 {
        bail!("passphrases do not match");
    }

    Ok(Passphrase::new(&pw1)?)
}

fn trim_newline(s: &mut String) {
    while s.ends_with('\n') || s.ends_with('\r') {
        s.pop();
    }
}
