use std::fmt;
use std::fs::File;
use std::io;
use std::net::TcpStream;
use std::path::{Path, PathBuf};
use std::time::Duration;

use regex::Regex;
use ssh2::{Session, Sftp};
use tracing::{debug, info};

use crate::endpoints::{PASSWORD_ENV, SFTP_HOST, SFTP_PORT, USERNAME_ENV};
use crate::error::{Error, Result};
use crate::product::Product;

/// G-Portal account credentials.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    /// Read `GPORTAL_USERNAME` and `GPORTAL_PASSWORD`.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let username = lookup(USERNAME_ENV).ok_or(Error::MissingCredentials(USERNAME_ENV))?;
        let password = lookup(PASSWORD_ENV).ok_or(Error::MissingCredentials(PASSWORD_ENV))?;
        Ok(Self { username, password })
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct SftpConfig {
    pub host: String,
    pub port: u16,
    pub credentials: Credentials,
    /// Applied to blocking SSH operations. `None` waits indefinitely.
    pub timeout: Option<Duration>,
}

impl SftpConfig {
    /// Config for the public G-Portal SFTP server.
    pub fn new(credentials: Credentials) -> Self {
        Self {
            host: SFTP_HOST.to_string(),
            port: SFTP_PORT,
            credentials,
            timeout: Some(Duration::from_secs(120)),
        }
    }

    pub fn from_env() -> Result<Self> {
        Ok(Self::new(Credentials::from_env()?))
    }
}

/// The remote operations [`SftpClient`] needs.
pub trait RemoteFileSystem {
    /// Entry names (not paths) of a remote directory.
    fn list_names(&self, path: &str) -> Result<Vec<String>>;

    /// Copy a remote file to `local_path`, returning the bytes written.
    fn fetch(&self, remote_path: &str, local_path: &Path) -> Result<u64>;
}

impl RemoteFileSystem for Sftp {
    fn list_names(&self, path: &str) -> Result<Vec<String>> {
        let entries = self.readdir(Path::new(path))?;
        Ok(entries
            .into_iter()
            .filter_map(|(p, _)| p.file_name().map(|n| n.to_string_lossy().into_owned()))
            .collect())
    }

    fn fetch(&self, remote_path: &str, local_path: &Path) -> Result<u64> {
        let mut remote = self.open(Path::new(remote_path))?;
        let mut local = File::create(local_path)?;
        Ok(io::copy(&mut remote, &mut local)?)
    }
}

/// Lists and downloads product files over SFTP.
pub struct SftpClient<F = Sftp> {
    fs: F,
    session: Option<Session>,
}

impl SftpClient<Sftp> {
    /// Open an authenticated SFTP session.
    pub fn connect(config: &SftpConfig) -> Result<Self> {
        let tcp = TcpStream::connect((config.host.as_str(), config.port))?;
        tcp.set_read_timeout(config.timeout)?;
        tcp.set_write_timeout(config.timeout)?;

        let mut session = Session::new()?;
        if let Some(timeout) = config.timeout {
            session.set_timeout(u32::try_from(timeout.as_millis()).unwrap_or(u32::MAX));
        }
        session.set_tcp_stream(tcp);
        session.handshake()?;
        session.userauth_password(&config.credentials.username, &config.credentials.password)?;

        let sftp = session.sftp()?;
        debug!(host = %config.host, port = config.port, "sftp session opened");

        Ok(Self {
            fs: sftp,
            session: Some(session),
        })
    }
}

impl<F: RemoteFileSystem> SftpClient<F> {
    /// Wrap an existing remote file system.
    pub fn new(fs: F) -> Self {
        Self { fs, session: None }
    }

    /// Names in `path`, optionally filtered by a regex (matched anywhere in the
    /// name) and optionally joined onto `path`.
    pub fn list_dir(
        &self,
        path: &str,
        filter_pattern: Option<&str>,
        full_path: bool,
    ) -> Result<Vec<String>> {
        let filter = filter_pattern.map(Regex::new).transpose()?;

        let names = self
            .fs
            .list_names(path)?
            .into_iter()
            .filter(|name| filter.as_ref().is_none_or(|re| re.is_match(name)));

        if full_path {
            let dir = path.trim_end_matches('/');
            Ok(names.map(|name| format!("{dir}/{name}")).collect())
        } else {
            Ok(names.collect())
        }
    }

    /// Download each remote file into `local_dir`, keeping its base name.
    pub fn download<I, S>(&self, remote_paths: I, local_dir: impl AsRef<Path>) -> Result<Vec<PathBuf>>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let local_dir = local_dir.as_ref();
        let mut out = Vec::new();

        for remote in remote_paths {
            let remote = remote.as_ref();
            let name = remote.rsplit('/').next().filter(|n| !n.is_empty()).ok_or_else(|| {
                Error::Io(io::Error::new(
                    io::ErrorKind::InvalidInput,
                    format!("remote path has no file name: {remote}"),
                ))
            })?;
            let local = local_dir.join(name);

            let bytes = self.fs.fetch(remote, &local)?;
            info!(remote, local = %local.display(), bytes, "downloaded");
            out.push(local);
        }

        Ok(out)
    }

    /// Download the data file of each product.
    pub fn download_products<'a>(
        &self,
        products: impl IntoIterator<Item = &'a Product>,
        local_dir: impl AsRef<Path>,
    ) -> Result<Vec<PathBuf>> {
        let paths = products
            .into_iter()
            .map(|p| {
                p.data_path().ok_or_else(|| {
                    Error::Decoding(format!(
                        "product {} has no data file",
                        p.id().unwrap_or("<unknown>")
                    ))
                })
            })
            .collect::<Result<Vec<_>>>()?;
        self.download(paths, local_dir)
    }

    /// End the SSH session, if this client owns one.
    pub fn close(self) -> Result<()> {
        if let Some(session) = self.session {
            session.disconnect(None, "closing", None)?;
        }
        Ok(())
    }
}
