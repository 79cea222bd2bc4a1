use crate::config::COPY_BUFFER_SIZE;
use bytes::BytesMut;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::{
    io::{self, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt},
    time::{sleep, Duration, Instant},
};

/// Bytes copied by each direction of a finished pairing.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RelayStats {
    pub inbound_to_outbound: u64,
    pub outbound_to_inbound: u64,
}

/// How a pairing ended: byte counts plus the terminal result of each
/// direction. `Ok(())` means the source reached EOF.
#[derive(Debug)]
pub struct RelayOutcome {
    pub stats: RelayStats,
    pub upstream: io::Result<()>,
    pub downstream: io::Result<()>,
}

/// Last time either direction of a pairing moved bytes.
struct Activity {
    start: Instant,
    last_millis: AtomicU64,
}

impl Activity {
    fn new() -> Self {
        Self {
            start: Instant::now(),
            last_millis: AtomicU64::new(0),
        }
    }

    fn touch(&self) {
        let now = self.start.elapsed().as_millis() as u64;
        self.last_millis.fetch_max(now, Ordering::Relaxed);
    }

    fn idle_for(&self) -> Duration {
        let last = Duration::from_millis(self.last_millis.load(Ordering::Relaxed));
        self.start.elapsed().saturating_sub(last)
    }
}

/// Copies bytes between `inbound` and `outbound` in both directions until
/// each direction has hit EOF or an error, then closes both streams.
///
/// A direction that finishes shuts down the write side of its destination,
/// so the peer sees end-of-stream while the opposite direction keeps
/// running. Neither stream is closed before both directions are done,
/// unless `idle_timeout` is set and neither direction moved a byte for
/// that long, in which case the whole pairing is closed.
pub async fn run<A, B>(inbound: A, outbound: B, idle_timeout: Option<Duration>) -> RelayOutcome
where
    A: AsyncRead + AsyncWrite,
    B: AsyncRead + AsyncWrite,
{
    // io::split rather than TcpStream::into_split so any stream type can be relayed
    let (mut inbound_read, mut inbound_write) = io::split(inbound);
    let (mut outbound_read, mut outbound_write) = io::split(outbound);

    let activity = Activity::new();
    let mut stats = RelayStats::default();
    let mut upstream = None;
    let mut downstream = None;

    tokio::select! {
        _ = async {
            tokio::join!(
                pump(
                    &mut inbound_read,
                    &mut outbound_write,
                    &activity,
                    &mut stats.inbound_to_outbound,
                    &mut upstream,
                ),
                pump(
                    &mut outbound_read,
                    &mut inbound_write,
                    &activity,
                    &mut stats.outbound_to_inbound,
                    &mut downstream,
                ),
            )
        } => {},
        _ = idle_watchdog(idle_timeout, &activity) => {},
    }

    // last halves out close the underlying streams
    drop((inbound_read, inbound_write));
    drop((outbound_read, outbound_write));

    let timed_out = || Err(io::Error::new(io::ErrorKind::TimedOut, "idle timeout"));
    RelayOutcome {
        stats,
        upstream: upstream.unwrap_or_else(timed_out),
        downstream: downstream.unwrap_or_else(timed_out),
    }
}

async fn idle_watchdog(idle_timeout: Option<Duration>, activity: &Activity) {
    let Some(limit) = idle_timeout else {
        return std::future::pending().await;
    };

    loop {
        let idle = activity.idle_for();
        if idle >= limit {
            return;
        }
        sleep(limit - idle).await;
    }
}

async fn pump<R, W>(
    reader: &mut R,
    writer: &mut W,
    activity: &Activity,
    transferred: &mut u64,
    result: &mut Option<io::Result<()>>,
) where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    *result = Some(copy_half(reader, writer, activity, transferred).await);
    let _ = writer.shutdown().await;
}

async fn copy_half<R, W>(
    reader: &mut R,
    writer: &mut W,
    activity: &Activity,
    transferred: &mut u64,
) -> io::Result<()>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut buf = BytesMut::with_capacity(COPY_BUFFER_SIZE);

    loop {
        let n = reader.read_buf(&mut buf).await?;
        if n == 0 {
            return Ok(());
        }
        activity.touch();

        writer.write_all(&buf).await?;
        activity.touch();
        *transferred += n as u64;
        buf.clear();
    }
}
