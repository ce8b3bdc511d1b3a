use bytes::BytesMut;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
#[cfg(unix)]
use tokio::net::UnixStream;

use crate::config::Network;
use crate::errors::BackendError;

// -----------------------------------------------------------------------------
// ----- Transport -------------------------------------------------------------

#[derive(Debug)]
pub(crate) enum Transport {
    Tcp(TcpStream),
    #[cfg(unix)]
    Unix(UnixStream),
}

impl Transport {
    pub(crate) async fn connect(network: Network, address: &str) -> Result<Self, BackendError> {
        if address.trim().is_empty() {
            return Err(BackendError::InvalidAddress(address.to_string()));
        }

        match network {
            Network::Tcp => {
                let stream = TcpStream::connect(address).await?;
                stream.set_nodelay(true)?;
                Ok(Transport::Tcp(stream))
            }

            #[cfg(unix)]
            Network::Unix => Ok(Transport::Unix(UnixStream::connect(address).await?)),

            #[cfg(not(unix))]
            Network::Unix => Err(BackendError::InvalidAddress(format!(
                "unix sockets are not supported on this platform: {address}"
            ))),
        }
    }

    pub(crate) async fn read_buf(&mut self, buf: &mut BytesMut) -> std::io::Result<usize> {
        match self {
            Transport::Tcp(stream) => stream.read_buf(buf).await,
            #[cfg(unix)]
            Transport::Unix(stream) => stream.read_buf(buf).await,
        }
    }

    pub(crate) async fn write_all_buf(&mut self, buf: &mut BytesMut) -> std::io::Result<()> {
        match self {
            Transport::Tcp(stream) => stream.write_all_buf(buf).await,
            #[cfg(unix)]
            Transport::Unix(stream) => stream.write_all_buf(buf).await,
        }
    }

    pub(crate) async fn shutdown(&mut self) -> std::io::Result<()> {
        match self {
            Transport::Tcp(stream) => stream.shutdown().await,
            #[cfg(unix)]
            Transport::Unix(stream) => stream.shutdown().await,
        }
    }
}

// -----------------------------------------------------------------------------
// -----------------------------------------------------------------------------
