//! In-process point-to-point fabric connecting the ranks of a cluster
//! strategy.
//!
//! Every rank owns an [`Endpoint`]: one inbox plus a sender per peer.
//! Delivery is FIFO per sender, and an envelope carries its origin rank, so
//! protocols can interleave traffic from many peers and still reason about
//! per-peer order. A dropped endpoint disconnects its channels; peers observe
//! that as a fatal [`CommError`] on their next operation.

use std::collections::VecDeque;
use std::sync::mpsc::{self, Receiver, Sender};

use thiserror::Error;

/// Rank index within a world. The coordinator is always rank 0.
pub type Rank = usize;

/// The coordinating rank.
pub const COORDINATOR: Rank = 0;

/// Fabric failures. Every one of them is fatal to the run.
#[derive(Debug, Error)]
pub enum CommError {
    #[error("Send to rank {0} failed: peer disconnected")]
    SendFailed(Rank),

    #[error("Receive on rank {0} failed: every peer disconnected")]
    RecvFailed(Rank),

    #[error("Rank {from} broke protocol: expected {expected}")]
    Protocol { from: Rank, expected: &'static str },
}

/// A tagged message between ranks.
#[derive(Debug, Clone)]
pub enum Message {
    /// Pipeline work order: the packed dependency arms of element
    /// `(m, m + k)`, row arm first.
    Block { m: usize, k: usize, halves: Vec<f64> },
    /// Pipeline result: the computed value of element `(m, m + k)`.
    Value { m: usize, k: usize, value: f64 },
    /// Collective contribution: one rank's share of generation `k`, in row
    /// order.
    Share { k: usize, values: Vec<f64> },
    /// End of stream: the receiver exits its service loop.
    Shutdown,
}

/// A message plus its origin rank.
#[derive(Debug)]
pub struct Envelope {
    pub from: Rank,
    pub message: Message,
}

/// One rank's connection to the rest of the world.
pub struct Endpoint {
    rank: Rank,
    world: usize,
    inbox: Receiver<Envelope>,
    /// Senders indexed by rank; `None` at this endpoint's own slot so the
    /// inbox disconnects once every peer is gone.
    peers: Vec<Option<Sender<Envelope>>>,
    /// Envelopes set aside by [`Endpoint::all_gather`] for a later call.
    deferred: VecDeque<Envelope>,
}

/// Build a fully connected world of `world` endpoints, indexed by rank.
pub fn connect(world: usize) -> Vec<Endpoint> {
    let (senders, inboxes): (Vec<_>, Vec<_>) = (0..world).map(|_| mpsc::channel()).unzip();
    inboxes
        .into_iter()
        .enumerate()
        .map(|(rank, inbox)| Endpoint {
            rank,
            world,
            inbox,
            peers: senders
                .iter()
                .enumerate()
                .map(|(peer, sender)| (peer != rank).then(|| sender.clone()))
                .collect(),
            deferred: VecDeque::new(),
        })
        .collect()
}

impl Endpoint {
    /// This endpoint's rank.
    pub fn rank(&self) -> Rank {
        self.rank
    }

    /// Number of ranks in the world.
    pub fn world(&self) -> usize {
        self.world
    }

    /// Send a message to rank `to`.
    pub fn send(&self, to: Rank, message: Message) -> Result<(), CommError> {
        let Some(peer) = self.peers[to].as_ref() else {
            return Err(CommError::SendFailed(to));
        };
        peer.send(Envelope {
            from: self.rank,
            message,
        })
        .map_err(|_| CommError::SendFailed(to))
    }

    /// Block until the next envelope arrives, from any peer.
    ///
    /// Envelopes deferred by [`Endpoint::all_gather`] are delivered first,
    /// preserving per-sender order.
    pub fn recv(&mut self) -> Result<Envelope, CommError> {
        if let Some(envelope) = self.deferred.pop_front() {
            return Ok(envelope);
        }
        self.inbox.recv().map_err(|_| CommError::RecvFailed(self.rank))
    }

    /// Send [`Message::Shutdown`] to every other rank, ignoring peers that
    /// are already gone.
    ///
    /// Failure paths use this to unblock ranks still waiting in [`recv`] or
    /// [`all_gather`] before joining them; a shutdown envelope ends a service
    /// loop and breaks a gather as a protocol error.
    ///
    /// [`recv`]: Endpoint::recv
    /// [`all_gather`]: Endpoint::all_gather
    pub fn release_peers(&self) {
        for peer in 0..self.world {
            if peer != self.rank {
                let _ = self.send(peer, Message::Shutdown);
            }
        }
    }

    /// Contribute `mine` to generation `k` and collect every rank's share,
    /// concatenated in rank order.
    ///
    /// This is the generation barrier of the collective strategy: the call
    /// returns only once a share from every peer has arrived. A peer that
    /// finished this generation first may already have sent its share for the
    /// next one; such envelopes are deferred, not lost.
    pub fn all_gather(&mut self, k: usize, mine: Vec<f64>) -> Result<Vec<f64>, CommError> {
        for peer in 0..self.world {
            if peer != self.rank {
                self.send(
                    peer,
                    Message::Share {
                        k,
                        values: mine.clone(),
                    },
                )?;
            }
        }

        let mut shares: Vec<Option<Vec<f64>>> = vec![None; self.world];
        shares[self.rank] = Some(mine);
        let mut missing = self.world - 1;
        let mut pending = std::mem::take(&mut self.deferred);

        while missing > 0 {
            let envelope = match pending.pop_front() {
                Some(envelope) => envelope,
                None => self
                    .inbox
                    .recv()
                    .map_err(|_| CommError::RecvFailed(self.rank))?,
            };
            let from = envelope.from;
            let Message::Share { k: generation, values } = envelope.message else {
                return Err(CommError::Protocol {
                    from,
                    expected: "generation share",
                });
            };
            if generation == k && shares[from].is_none() {
                shares[from] = Some(values);
                missing -= 1;
            } else {
                self.deferred.push_back(Envelope {
                    from,
                    message: Message::Share {
                        k: generation,
                        values,
                    },
                });
            }
        }

        while let Some(envelope) = pending.pop_back() {
            self.deferred.push_front(envelope);
        }

        Ok(shares.into_iter().flatten().flatten().collect())
    }
}
