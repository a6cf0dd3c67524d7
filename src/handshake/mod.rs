mod digest;
mod state;
mod c0c1;
mod s0s1s2;

pub use digest::*;
pub use state::*;
pub use c0c1::*;
pub use s0s1s2::*;

use crate::utils::{read_exact_within, write_all_within};
use crate::{Error, Result};
use log::debug;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HandshakeOptions {
    /// Deadline for each individual read and write
    pub timeout: Option<Duration>,

    /// Also check the digest on the peer's C2/S2
    pub verify_peer_response: bool,
}

impl Default for HandshakeOptions {
    fn default() -> Self {
        HandshakeOptions {
            timeout: Some(Duration::from_secs(10)),
            verify_peer_response: false,
        }
    }
}

/// Runs the digest handshake for one side of a connection.
///
/// Any failure is final: the state moves to `Failed` and the caller is
/// expected to drop the stream.
pub struct Handshake {
    state: HandshakeState,
    options: HandshakeOptions,
}

impl Handshake {
    pub fn new(role: HandshakeRole, options: HandshakeOptions) -> Self {
        Handshake {
            state: HandshakeState::new(role),
            options,
        }
    }

    pub fn server(options: HandshakeOptions) -> Self {
        Handshake::new(HandshakeRole::Server, options)
    }

    pub fn client(options: HandshakeOptions) -> Self {
        Handshake::new(HandshakeRole::Client, options)
    }

    pub fn state(&self) -> &HandshakeState {
        &self.state
    }

    /// Drive the exchange to completion over `stream`
    pub async fn run<S>(&mut self, stream: &mut S) -> Result<()>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        if self.state.phase() != HandshakePhase::NotStarted {
            return Err(Error::invalid_state(format!(
                "handshake already in phase {}",
                self.state.phase()
            )));
        }

        let result = match self.state.role() {
            HandshakeRole::Server => self.run_server(stream).await,
            HandshakeRole::Client => self.run_client(stream).await,
        };

        if result.is_err() {
            self.state.transition(HandshakeEvent::Error)?;
        }
        result
    }

    async fn read_packet<S>(&self, stream: &mut S, len: usize, what: &str) -> Result<Vec<u8>>
    where
        S: AsyncRead + Unpin,
    {
        let mut buf = vec![0u8; len];
        read_exact_within(stream, &mut buf, self.options.timeout, what).await?;
        Ok(buf)
    }

    async fn run_server<S>(&mut self, stream: &mut S) -> Result<()>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let c0c1 = self.read_packet(stream, 1 + HANDSHAKE_SIZE, "C0+C1").await?;
        let c0c1 = Challenge::parse(&c0c1)?;
        let (c1_digest, s2_key) = c0c1.verify(client_partial_key(), &SERVER_FULL_KEY)?;
        self.state.peer_digest = Some(c1_digest);
        self.state.transition(HandshakeEvent::VerifiedPeer)?;
        debug!("C1 digest verified");

        let (reply, s1_digest) = S0S1S2::generate(server_partial_key(), &s2_key)?;
        write_all_within(stream, &reply.encode(), self.options.timeout, "S0+S1+S2").await?;
        self.state.local_digest = Some(s1_digest);
        self.state.transition(HandshakeEvent::SentChallenge)?;

        let c2 = self.read_packet(stream, HANDSHAKE_SIZE, "C2").await?;
        if self.options.verify_peer_response {
            let key = Response::expected_key(&s1_digest, &CLIENT_FULL_KEY)?;
            Response::parse(&c2)?.verify(&key)?;
        }

        self.state.transition(HandshakeEvent::Finished)?;
        debug!("server handshake complete");
        Ok(())
    }

    async fn run_client<S>(&mut self, stream: &mut S) -> Result<()>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let (c0c1, c1_digest) = Challenge::create(client_partial_key())?;
        write_all_within(stream, &c0c1.encode(), self.options.timeout, "C0+C1").await?;
        self.state.local_digest = Some(c1_digest);
        self.state.transition(HandshakeEvent::SentChallenge)?;

        let reply = self
            .read_packet(stream, 1 + 2 * HANDSHAKE_SIZE, "S0+S1+S2")
            .await?;
        let reply = S0S1S2::parse(&reply)?;
        let (s1_digest, c2_key) = reply.s0s1.verify(server_partial_key(), &CLIENT_FULL_KEY)?;
        self.state.peer_digest = Some(s1_digest);

        if self.options.verify_peer_response {
            let key = Response::expected_key(&c1_digest, &SERVER_FULL_KEY)?;
            reply.s2.verify(&key)?;
        }
        self.state.transition(HandshakeEvent::VerifiedPeer)?;
        debug!("S1 digest verified");

        let c2 = Response::create(&c2_key)?;
        write_all_within(stream, c2.encode(), self.options.timeout, "C2").await?;

        self.state.transition(HandshakeEvent::Finished)?;
        debug!("client handshake complete");
        Ok(())
    }
}

/// Run the server side of the handshake
pub async fn server_handshake<S>(stream: &mut S, options: HandshakeOptions) -> Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    Handshake::server(options).run(stream).await
}

/// Run the client side of the handshake
pub async fn client_handshake<S>(stream: &mut S, options: HandshakeOptions) -> Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    Handshake::client(options).run(stream).await
}
