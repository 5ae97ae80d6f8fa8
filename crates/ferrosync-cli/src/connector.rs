//! Backend selection for a server configuration

use async_trait::async_trait;
use ferrosync_config::{SyncConfig, Transport};
use ferrosync_remote::{MountedConnector, RemoteConnector, RemoteFs};
#[cfg(feature = "ssh")]
use ferrosync_remote::SftpConnector;
#[cfg(not(feature = "ssh"))]
use ferrosync_types::Error;
use ferrosync_types::Result;

/// The connector matching a server's transport
#[derive(Debug, Clone, Copy)]
pub enum Connector {
    /// Locally mounted remote root
    Mounted(MountedConnector),
    /// SFTP over SSH
    #[cfg(feature = "ssh")]
    Sftp(SftpConnector),
}

impl Connector {
    /// Pick the connector for `config`
    pub fn for_config(config: &SyncConfig) -> Result<Self> {
        match &config.transport {
            Transport::Mounted { .. } => Ok(Self::Mounted(MountedConnector)),
            #[cfg(feature = "ssh")]
            Transport::Sftp => Ok(Self::Sftp(SftpConnector)),
            #[cfg(not(feature = "ssh"))]
            Transport::Sftp => Err(Error::config(format!(
                "SFTP support for {} requires building with the `ssh` feature, \
                 or sync through a mounted directory with --mount-root",
                config.host
            ))),
        }
    }
}

#[async_trait]
impl RemoteConnector for Connector {
    async fn connect(&self, config: &SyncConfig) -> Result<Box<dyn RemoteFs>> {
        match self {
            Self::Mounted(connector) => connector.connect(config).await,
            #[cfg(feature = "ssh")]
            Self::Sftp(connector) => connector.connect(config).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mounted_transport_selects_mounted_connector() {
        let config = SyncConfig::builder("host", "user")
            .password("pw")
            .mounted("/mnt/host")
            .build()
            .unwrap();
        assert!(matches!(
            Connector::for_config(&config),
            Ok(Connector::Mounted(_))
        ));
    }

    #[cfg(feature = "ssh")]
    #[test]
    fn test_sftp_transport_selects_sftp_connector() {
        let config = SyncConfig::builder("host", "user")
            .password("pw")
            .build()
            .unwrap();
        assert!(matches!(
            Connector::for_config(&config),
            Ok(Connector::Sftp(_))
        ));
    }

    #[cfg(not(feature = "ssh"))]
    #[test]
    fn test_sftp_requires_feature() {
        let config = SyncConfig::builder("host", "user")
            .password("pw")
            .build()
            .unwrap();
        let error = Connector::for_config(&config).unwrap_err();
        assert!(matches!(error, Error::Config { .. }));
    }
}
