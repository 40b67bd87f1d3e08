use std::path::{Path, PathBuf};

/// Nameservers read from a resolv.conf(5) file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvConf {
    /// Nameserver addresses in file order, kept verbatim.
    pub servers: Vec<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum ResolvConfError {
    #[error("unable to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("no nameserver entries in {}", path.display())]
    NoServers { path: PathBuf },
}

impl ResolvConf {
    /// Read and parse the file at `path`.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ResolvConfError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ResolvConfError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self::parse(&content))
    }

    /// Collect `nameserver` entries. Every other directive is skipped.
    pub fn parse(content: &str) -> Self {
        let servers = content
            .lines()
            .map(|line| match line.find(['#', ';']) {
                Some(idx) => &line[..idx],
                None => line,
            })
            .filter_map(|line| {
                let mut fields = line.split_whitespace();
                match (fields.next(), fields.next()) {
                    (Some("nameserver"), Some(server)) => Some(server.to_string()),
                    _ => None,
                }
            })
            .collect();

        Self { servers }
    }
}
