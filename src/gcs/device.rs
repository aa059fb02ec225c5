use std::{collections::HashMap, time::Duration};

use futures::{SinkExt, StreamExt};
use tokio::{
    io::{AsyncRead, AsyncWrite},
    net::{TcpStream, ToSocketAddrs},
};
use tokio_util::codec::Framed;
use tracing::{debug, trace};

use super::{
    codec::GcsCodec,
    error::{GcsError, GcsResult},
};

/// Default GCS TCP port of PI controllers.
pub const DEFAULT_PORT: u16 = 50000;

/// Matches the PI reference driver's default.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(7);

/// Line-level GCS connection: framing, timeouts and `ERR?` checking.
///
/// Generic over the byte stream so the same code drives a TCP socket to
/// the hardware or an in-memory pipe in tests.
pub struct GcsDevice<S = TcpStream> {
    framed: Framed<S, GcsCodec>,
    timeout: Duration,
}

impl GcsDevice<TcpStream> {
    pub async fn connect<A: ToSocketAddrs>(addr: A, timeout: Duration) -> GcsResult<Self> {
        let stream = tokio::time::timeout(timeout, TcpStream::connect(addr))
            .await
            .map_err(|_| GcsError::ConnectionFailed("connect timed out".to_string()))?
            .map_err(|e| GcsError::ConnectionFailed(format!("Failed to connect: {e}")))?;
        stream.set_nodelay(true)?;

        debug!("Connected to PI controller via TCP");

        let mut device = Self::new(stream);
        device.set_timeout(timeout);
        Ok(device)
    }
}

impl<S> GcsDevice<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    pub fn new(stream: S) -> Self {
        Self {
            framed: Framed::new(stream, GcsCodec::new()),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn set_timeout(&mut self, timeout: Duration) {
        self.timeout = timeout;
    }

    /// Send a raw command without waiting for anything back.
    pub async fn send(&mut self, command: &str) -> GcsResult<()> {
        debug!("GCS send: {:?}", command.trim());
        self.framed.send(command.to_string()).await
    }

    /// Read one complete response.
    pub async fn read(&mut self) -> GcsResult<String> {
        match tokio::time::timeout(self.timeout, self.framed.next()).await {
            Err(_) => Err(GcsError::Timeout),
            Ok(None) => Err(GcsError::ConnectionClosed),
            Ok(Some(result)) => {
                let response = result?;
                trace!("GCS recv: {:?}", response);
                Ok(response)
            }
        }
    }

    /// Send a query, read its answer, then make sure `ERR?` reports 0.
    pub async fn query(&mut self, command: &str) -> GcsResult<String> {
        self.send(command).await?;
        let response = self.read().await?;
        self.check_error().await?;
        Ok(response)
    }

    /// Send a command that has no answer and make sure `ERR?` reports 0.
    pub async fn command(&mut self, command: &str) -> GcsResult<()> {
        self.send(command).await?;
        self.check_error().await
    }

    pub async fn check_error(&mut self) -> GcsResult<()> {
        match self.last_error().await? {
            0 => Ok(()),
            code => Err(GcsError::controller(code)),
        }
    }

    /// Read and clear the controller's error register.
    pub async fn last_error(&mut self) -> GcsResult<i32> {
        self.send("ERR?").await?;
        let response = self.read().await?;
        response
            .trim()
            .parse()
            .map_err(|_| GcsError::InvalidResponse(format!("Invalid error code: {response:?}")))
    }
}

/// Parse `axis=value` lines into a map.
pub fn parse_axis_values(response: &str) -> GcsResult<HashMap<String, f64>> {
    let mut result = HashMap::new();

    for (axis, value) in split_pairs(response)? {
        let value: f64 = value
            .parse()
            .map_err(|_| GcsError::ParseError(format!("Invalid number: {value}")))?;
        result.insert(axis.to_string(), value);
    }

    Ok(result)
}

/// Value of a single-axis answer such as `POS? 1`.
pub fn parse_single_value(response: &str) -> GcsResult<f64> {
    parse_axis_values(response)?
        .into_values()
        .next()
        .ok_or_else(|| GcsError::ParseError("No value in response".to_string()))
}

/// Parse `axis=0|1` lines into a map.
pub fn parse_axis_bools(response: &str) -> GcsResult<HashMap<String, bool>> {
    Ok(split_pairs(response)?
        .into_iter()
        .map(|(axis, value)| {
            let flag = value == "1" || value.eq_ignore_ascii_case("true");
            (axis.to_string(), flag)
        })
        .collect())
}

pub fn parse_single_bool(response: &str) -> GcsResult<bool> {
    parse_axis_bools(response)?
        .into_values()
        .next()
        .ok_or_else(|| GcsError::ParseError("No value in response".to_string()))
}

fn split_pairs(response: &str) -> GcsResult<Vec<(&str, &str)>> {
    response
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(|line| {
            line.split_once('=')
                .map(|(axis, value)| (axis.trim(), value.trim()))
                .ok_or_else(|| GcsError::ParseError(format!("Invalid response format: {line}")))
        })
        .collect()
}
