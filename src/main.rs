use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
mod auth;
use keyfort::{CAPACITY, Entry, FileMedium, Vault, VaultError, random_password};
use std::path::PathBuf;

fn resolve_store(path: Option<PathBuf>) -> Result<PathBuf> {
    match path {
        Some(p) => Ok(p),
        None => keyfort::default_image_path().context("could not determine platform directories"),
    }
}

/// Opens the image, checks the header, and unlocks with the caller's
/// passphrase.
fn open_unlocked(path: &PathBuf) -> Result<Vault<FileMedium>> {
    let medium = FileMedium::open(path)
        .with_context(|| format!("failed to open store image {}", path.display()))?;
    let mut vault = Vault::new(medium);
    if vault.read_header()?.is_none() {
        return Err(VaultError::Uninitialized).context("run `keyfort format` first");
    }
    let passphrase = auth::read_passphrase()?;
    if !vault.unlock(passphrase)? {
        bail!("wrong passphrase or corrupted store");
    }
    Ok(vault)
}

#[derive(Debug, Parser)]
#[command(name = "keyfort")]
#[command(
    version,
    about = "Offline secrets vault over a hardware-style EEPROM image."
)]
struct Cli {
    ///Path to the keyfort store image
    #[arg(long, global = true, value_name = "PATH", env = "KEYFORT_PATH")]
    store: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Creates and formats a new store image
    Format {
        /// Device name recorded in the header
        #[arg(long, default_value = "keyfort")]
        name: String,
    },

    /// Lists entry titles by index
    List,

    /// Prints one entry's login and secret
    #[command(arg_required_else_help = true)]
    Show { index: u8 },

    /// Stores a new entry at its sorted position
    #[command(arg_required_else_help = true)]
    Insert {
        title: String,
        login: String,
        secret: String,
    },

    /// Removes the entry at an index
    #[command(arg_required_else_help = true)]
    Remove { index: u8 },

    /// Rewrites the device name in the header
    #[command(arg_required_else_help = true)]
    Rename { name: String },

    /// Changes the master passphrase, re-encrypting every entry
    ChangePass,

    /// Prints a random password
    Generate {
        /// Password length in characters
        #[arg(long, default_value_t = 24)]
        length: usize,
    },

    /// Shows header information
    Info,
}

fn main() -> Result<()> {
    let args = Cli::parse();
    match args.command {
        Commands::Format { name } => {
            let path = resolve_store(args.store)?;
            if path.exists() {
                bail!("store image already exists at {}", path.display());
            }
            let passphrase = auth::read_new_passphrase_with_confirmation()?;
            let mut vault = Vault::new(FileMedium::create(&path)?);
            vault.format(passphrase, &name)?;
            println!("store formatted at {}", path.display());
        }
        Commands::List => {
            let path = resolve_store(args.store)?;
            let mut vault = open_unlocked(&path)?;
            if vault.nb_entries() == 0 {
                println!("no entries stored");
                return Ok(());
            }
            for index in 0..vault.nb_entries() {
                if let Some(title) = vault.get_title(index)? {
                    println!("{index:>2}  {title}");
                }
            }
        }
        Commands::Show { index } => {
            let path = resolve_store(args.store)?;
            let mut vault = open_unlocked(&path)?;
            match vault.get_entry(index)? {
                Some(entry) => {
                    println!("title:  {}", entry.title());
                    println!("login:  {}", entry.login());
                    println!("secret: {}", entry.secret());
                }
                None => bail!("no entry at index {index}"),
            }
        }
        Commands::Insert {
            title,
            login,
            secret,
        } => {
            let path = resolve_store(args.store)?;
            let mut vault = open_unlocked(&path)?;
            let entry = Entry::new(&title, &login, &secret)?;
            let index = vault.insert_entry(&entry)?;
            println!("stored '{title}' at index {index}");
        }
        Commands::Remove { index } => {
            let path = resolve_store(args.store)?;
            let mut vault = open_unlocked(&path)?;
            if vault.get_title(index)?.is_none() {
                bail!("no entry at index {index}");
            }
            vault.remove_entry(index)?;
            println!("entry {index} removed");
        }
        Commands::Rename { name } => {
            let path = resolve_store(args.store)?;
            let mut vault = open_unlocked(&path)?;
            vault.set_device_name(&name)?;
            println!("device renamed to '{name}'");
        }
        Commands::ChangePass => {
            let path = resolve_store(args.store)?;
            let mut vault = open_unlocked(&path)?;
            let new = auth::read_new_passphrase_with_confirmation()?;
            vault.change_passphrase(new)?;
            println!("passphrase changed");
        }
        Commands::Generate { length } => {
            println!("{}", random_password(length)?);
        }
        Commands::Info => {
            let path = resolve_store(args.store)?;
            let medium = FileMedium::open(&path)
                .with_context(|| format!("failed to open store image {}", path.display()))?;
            let mut vault = Vault::new(medium);
            match vault.read_header()? {
                Some(name) => {
                    println!("device:  {name}");
                    println!("entries: {}/{}", vault.nb_entries(), CAPACITY);
                }
                None => return Err(VaultError::Uninitialized).context("run `keyfort format` first"),
            }
        }
    }

    Ok(())
}
