use anyhow::{Context, Result, anyhow};
use reqctl_shared::{roles::Role, users::Operator};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs::{self, File, OpenOptions};
use std::io::{BufReader, BufWriter};
#[cfg(unix)]
use std::os::unix::fs::PermissionsExt;
use std::path::PathBuf;
use tracing::info;

mod guard;

pub use guard::{Access, Redirect, check_access, require_superadmin};

/// Operator identity plus the bearer token used against the service.
#[derive(Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Session {
    pub token: String,
    pub operator: Operator,
}

impl Session {
    pub fn new(token: impl Into<String>, operator: Operator) -> Self {
        Self {
            token: token.into(),
            operator,
        }
    }

    pub fn role(&self) -> Role {
        self.operator.role
    }
}

// keep the token out of logs
impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("token", &"<redacted>")
            .field("operator", &self.operator)
            .finish()
    }
}

/// File backed storage for the CLI session.
#[derive(Debug, Clone)]
pub struct SessionStore {
    path: PathBuf,
}

impl SessionStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn open_default() -> Result<Self> {
        Ok(Self::new(Self::default_credentials_path()?))
    }

    pub fn default_credentials_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir().context("Failed to get config directory")?;
        Ok(config_dir.join("reqctl").join("credentials.json"))
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    pub fn load(&self) -> Result<Option<Session>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let file = File::open(&self.path).context("Failed to open credentials file")?;
        let reader = BufReader::new(file);
        let session: Session =
            serde_json::from_reader(reader).context("Failed to parse credentials file")?;
        Ok(Some(session))
    }

    pub fn require(&self) -> Result<Session> {
        self.load()?
            .ok_or_else(|| anyhow!("Not logged in. Run `reqctl login` first"))
    }

    pub fn save(&self, session: &Session) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).context("Failed to create credentials directory")?;
        }
        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&self.path)
            .context("Failed to open credentials file for writing")?;

        #[cfg(unix)]
        {
            use std::fs::Permissions;
            file.set_permissions(Permissions::from_mode(0o600))?;
        }

        let writer = BufWriter::new(file);
        serde_json::to_writer_pretty(writer, session)?;
        info!("Credentials saved to: {:?}", self.path);
        Ok(())
    }

    pub fn clear(&self) -> Result<()> {
        if self.path.exists() {
            fs::remove_file(&self.path).context("Failed to delete credentials file")?;
            info!("Deleted credentials at {:?}", self.path);
        }
        Ok(())
    }
}
