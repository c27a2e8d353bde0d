//! Material de clave efímero.
//!
//! `EphemeralKeyPair` escribe la clave privada y la pública en archivos
//! temporales con nombre único (modo 0600) y los borra al soltarse.
//! `CredentialLease` envuelve la credencial y un par opcional, así la
//! limpieza está definida tanto para password como para clave.
use std::io::Write;
use std::path::{Path, PathBuf};

use log::{debug, warn};
use pipeflow_core::{Auth, Credentials};
use tempfile::{Builder, NamedTempFile};

use crate::error::ExecError;
use crate::session::RemoteCredential;

pub struct EphemeralKeyPair {
    private_key: NamedTempFile,
    public_key: NamedTempFile,
}

fn write_key(dir: &Path, suffix: &str, contents: &str) -> std::io::Result<NamedTempFile> {
    let mut file = Builder::new().prefix("key-").suffix(suffix).tempfile_in(dir)?;
    file.write_all(contents.as_bytes())?;
    // ssh rechaza claves sin salto de línea final.
    if !contents.ends_with('\n') {
        file.write_all(b"\n")?;
    }
    file.flush()?;
    Ok(file)
}

impl EphemeralKeyPair {
    pub fn write(dir: &Path, private_key: &str, public_key: &str) -> Result<Self, ExecError> {
        std::fs::create_dir_all(dir)?;
        let private_key = write_key(dir, "", private_key)?;
        let public_key = write_key(dir, ".pub", public_key)?;
        debug!("keys:write private={} public={}",
               private_key.path().display(),
               public_key.path().display());
        Ok(Self { private_key, public_key })
    }

    pub fn private_path(&self) -> &Path {
        self.private_key.path()
    }

    pub fn public_path(&self) -> &Path {
        self.public_key.path()
    }

    /// Borra ambos archivos reportando errores de IO.
    pub fn release(self) -> std::io::Result<()> {
        let private = self.private_key.close();
        let public = self.public_key.close();
        private.and(public)
    }
}

pub struct CredentialLease {
    credential: RemoteCredential,
    keys: Option<EphemeralKeyPair>,
}

impl CredentialLease {
    /// Elige el modo según `Auth::is_key_authentication` y materializa la
    /// credencial.
    pub fn acquire(auth: &Auth, key_dir: &Path) -> Result<Self, ExecError> {
        if auth.username.trim().is_empty() {
            return Err(ExecError::AuthenticationConfiguration(format!("auth {} has an empty username", auth.id)));
        }
        match &auth.credentials {
            Credentials::KeyPair { private_key, public_key } => {
                if private_key.trim().is_empty() {
                    return Err(ExecError::AuthenticationConfiguration(format!("auth {} has an empty private key",
                                                                              auth.id)));
                }
                let keys = EphemeralKeyPair::write(key_dir, private_key, public_key)?;
                let credential = RemoteCredential::KeyFile { username: auth.username.clone(),
                                                             public_key_path: keys.public_path().to_path_buf(),
                                                             private_key_path: keys.private_path().to_path_buf() };
                Ok(Self { credential,
                          keys: Some(keys) })
            }
            Credentials::Password { password } => {
                Ok(Self { credential: RemoteCredential::Password { username: auth.username.clone(),
                                                                   secret: password.clone() },
                          keys: None })
            }
        }
    }

    pub fn credential(&self) -> &RemoteCredential {
        &self.credential
    }

    /// Rutas de material efímero en uso (vacío para password).
    pub fn key_paths(&self) -> Vec<PathBuf> {
        self.keys
            .as_ref()
            .map(|k| vec![k.private_path().to_path_buf(), k.public_path().to_path_buf()])
            .unwrap_or_default()
    }

    /// Libera el material. Un error se loguea; el drop de los temporales
    /// ya intentó el borrado.
    pub fn release(self) {
        if let Some(keys) = self.keys {
            if let Err(e) = keys.release() {
                warn!("keys:release failed err={e}");
            }
        }
    }
}
