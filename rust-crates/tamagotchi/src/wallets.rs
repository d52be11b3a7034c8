use color_eyre::eyre::{
    Result,
    WrapErr,
    eyre,
};
use eth_keystore::decrypt_key;
use generated_bindings::Felt;
use rpassword::prompt_password;
use std::{
    fs,
    path::{
        Path,
        PathBuf,
    },
};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct KeystoreDescriptor {
    pub name: String,
    pub path: PathBuf,
}

impl KeystoreDescriptor {
    pub fn new(name: impl Into<String>, path: PathBuf) -> Self {
        Self {
            name: name.into(),
            path,
        }
    }

    fn from_path(path: PathBuf) -> Result<Self> {
        let name = path
            .file_stem()
            .and_then(|stem| stem.to_str())
            .ok_or_else(|| eyre!("Invalid keystore filename {:?}", path))?
            .to_owned();
        Ok(Self::new(name, path))
    }
}

pub fn default_keystore_dir() -> Result<PathBuf> {
    let home = std::env::var("HOME").wrap_err("HOME environment variable not set")?;
    Ok(PathBuf::from(home).join(".starkli-wallets").join("deployer"))
}

pub fn resolve_keystore_dir(dir: Option<&str>) -> Result<PathBuf> {
    match dir {
        Some(raw) => Ok(PathBuf::from(shellexpand::tilde(raw).into_owned())),
        None => default_keystore_dir(),
    }
}

/// `raw` is either a path to a keystore file or the name of one inside
/// `dir`.
pub fn resolve_keystore(raw: &str, dir: &Path) -> Result<KeystoreDescriptor> {
    let expanded = PathBuf::from(shellexpand::tilde(raw).into_owned());
    if expanded.is_file() {
        return KeystoreDescriptor::from_path(expanded);
    }
    find_keystore(dir, raw)
}

pub fn list_keystores(dir: &Path) -> Result<Vec<KeystoreDescriptor>> {
    if !dir.exists() {
        return Ok(Vec::new());
    }
    let mut keystores = Vec::new();
    for entry in fs::read_dir(dir).wrap_err("Failed to read keystore directory")? {
        let entry = entry.wrap_err("Failed to read keystore entry")?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        if path.extension().and_then(|ext| ext.to_str()) != Some("json") {
            continue;
        }
        keystores.push(KeystoreDescriptor::from_path(path)?);
    }
    keystores.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(keystores)
}

pub fn find_keystore(dir: &Path, name: &str) -> Result<KeystoreDescriptor> {
    list_keystores(dir)?
        .into_iter()
        .find(|keystore| keystore.name == name)
        .ok_or_else(|| eyre!("Keystore '{name}' not found in {}", dir.to_string_lossy()))
}

/// Prompts for the keystore password and returns the decrypted signing key.
pub fn unlock_keystore(descriptor: &KeystoreDescriptor) -> Result<Felt> {
    let prompt = format!("Enter password for keystore '{}': ", descriptor.name);
    let password = prompt_password(prompt).wrap_err("Failed to read keystore password")?;

    let secret = decrypt_key(&descriptor.path, password.as_bytes())
        .map_err(|_| eyre!("Invalid password for keystore '{}'", descriptor.name))?;

    secret_to_felt(&secret)
        .wrap_err_with(|| format!("Keystore '{}' holds an unusable key", descriptor.name))
}

pub fn secret_to_felt(secret: &[u8]) -> Result<Felt> {
    if secret.is_empty() || secret.len() > 32 {
        return Err(eyre!("expected a key of 1 to 32 bytes, got {}", secret.len()));
    }
    let mut bytes = [0u8; 32];
    bytes[32 - secret.len()..].copy_from_slice(secret);
    Ok(Felt::from_bytes_be(&bytes))
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]
    use super::*;
    use tempdir::TempDir;

    #[test]
    fn list_keystores__only_json_files__sorted_by_name() {
        // given
        let dir = TempDir::new("keystores").unwrap();
        fs::write(dir.path().join("zeta.json"), "{}").unwrap();
        fs::write(dir.path().join("alpha.json"), "{}").unwrap();
        fs::write(dir.path().join("notes.txt"), "").unwrap();
        fs::create_dir(dir.path().join("nested.json")).unwrap();

        // when
        let keystores = list_keystores(dir.path()).unwrap();

        // then
        let names: Vec<_> = keystores.iter().map(|k| k.name.as_str()).collect();
        assert_eq!(names, vec!["alpha", "zeta"]);
    }

    #[test]
    fn list_keystores__missing_dir__is_empty() {
        let dir = TempDir::new("keystores").unwrap();

        let keystores = list_keystores(&dir.path().join("absent")).unwrap();

        assert!(keystores.is_empty());
    }

    #[test]
    fn resolve_keystore__by_name_or_by_path() {
        // given
        let dir = TempDir::new("keystores").unwrap();
        let path = dir.path().join("player.json");
        fs::write(&path, "{}").unwrap();

        // when
        let by_name = resolve_keystore("player", dir.path()).unwrap();
        let by_path = resolve_keystore(path.to_str().unwrap(), Path::new("/nonexistent")).unwrap();

        // then
        assert_eq!(by_name, KeystoreDescriptor::new("player", path.clone()));
        assert_eq!(by_path, by_name);
    }

    #[test]
    fn find_keystore__unknown_name__is_an_error() {
        let dir = TempDir::new("keystores").unwrap();

        let err = find_keystore(dir.path(), "ghost").unwrap_err();

        assert!(err.to_string().contains("ghost"));
    }

    #[test]
    fn secret_to_felt__short_secret__is_left_padded() {
        let felt = secret_to_felt(&[0x01, 0x02]).unwrap();

        assert_eq!(felt, Felt::from(0x0102u64));
    }

    #[test]
    fn secret_to_felt__oversized_secret__is_rejected() {
        assert!(secret_to_felt(&[0xff; 33]).is_err());
        assert!(secret_to_felt(&[]).is_err());
    }
}
