// thread-backed communicator: one worker per OS thread, no shared grid memory

use crossbeam_channel::{bounded, Receiver, Sender};
use tracing::debug;

use super::Comm;
use crate::error::RelaxError;

enum Packet {
    Row(Vec<f64>),
    Flag(bool),
}

/// In-process communicator for a group of worker threads.
///
/// Every ordered pair of ranks is linked by a zero-capacity channel, so a send only completes
/// once the peer is inside the matching receive, like `MPI_Ssend`. A dropped peer surfaces
/// as a [`RelaxError::CommunicationFailure`] on the other end.
pub struct ThreadComm {
    rank: usize,
    size: usize,
    tx: Vec<Option<Sender<Packet>>>,
    rx: Vec<Option<Receiver<Packet>>>,
}

impl ThreadComm {
    /// Builds the communicators of a `size`-worker group, indexed by rank.
    pub fn world(size: usize) -> Vec<ThreadComm> {
        let mut tx: Vec<Vec<Option<Sender<Packet>>>> =
            (0..size).map(|_| (0..size).map(|_| None).collect()).collect();
        let mut rx: Vec<Vec<Option<Receiver<Packet>>>> =
            (0..size).map(|_| (0..size).map(|_| None).collect()).collect();
        for from in 0..size {
            for to in 0..size {
                if from != to {
                    let (s, r) = bounded(0);
                    tx[from][to] = Some(s);
                    rx[to][from] = Some(r);
                }
            }
        }
        tx.into_iter()
            .zip(rx)
            .enumerate()
            .map(|(rank, (tx, rx))| ThreadComm { rank, size, tx, rx })
            .collect()
    }

    fn link_err(&self, peer: usize, what: &str) -> RelaxError {
        RelaxError::CommunicationFailure(format!("rank {} <-> {peer}: {what}", self.rank))
    }

    fn send(&self, dest: usize, packet: Packet) -> Result<(), RelaxError> {
        let link = self
            .tx
            .get(dest)
            .and_then(Option::as_ref)
            .ok_or_else(|| self.link_err(dest, "no such peer"))?;
        link.send(packet).map_err(|_| self.link_err(dest, "peer disconnected"))
    }

    fn recv(&self, src: usize) -> Result<Packet, RelaxError> {
        let link = self
            .rx
            .get(src)
            .and_then(Option::as_ref)
            .ok_or_else(|| self.link_err(src, "no such peer"))?;
        link.recv().map_err(|_| self.link_err(src, "peer disconnected"))
    }
}

impl Comm for ThreadComm {
    fn rank(&self) -> usize {
        self.rank
    }

    fn size(&self) -> usize {
        self.size
    }

    fn send_row(&self, dest: usize, row: &[f64]) -> Result<(), RelaxError> {
        self.send(dest, Packet::Row(row.to_vec()))
    }

    fn recv_row(&self, src: usize, row: &mut [f64]) -> Result<(), RelaxError> {
        match self.recv(src)? {
            Packet::Row(data) if data.len() == row.len() => {
                row.copy_from_slice(&data);
                Ok(())
            }
            Packet::Row(data) => Err(self.link_err(
                src,
                &format!("expected {} values, got {}", row.len(), data.len()),
            )),
            Packet::Flag(_) => Err(self.link_err(src, "expected a row, got a flag")),
        }
    }

    // gather to rank 0, then broadcast the decision
    fn all_reduce_and(&self, flag: bool) -> Result<bool, RelaxError> {
        if self.rank == 0 {
            let mut all = flag;
            for src in 1..self.size {
                match self.recv(src)? {
                    Packet::Flag(f) => all &= f,
                    Packet::Row(_) => return Err(self.link_err(src, "expected a flag, got a row")),
                }
            }
            for dest in 1..self.size {
                self.send(dest, Packet::Flag(all))?;
            }
            Ok(all)
        } else {
            self.send(0, Packet::Flag(flag))?;
            match self.recv(0)? {
                Packet::Flag(all) => Ok(all),
                Packet::Row(_) => Err(self.link_err(0, "expected a flag, got a row")),
            }
        }
    }
}

/// Runs `worker` once per rank of a fresh `size`-thread group and collects the results in
/// rank order. A panicking worker is reported as a communication failure, and an empty group
/// yields a single configuration error instead of an empty result list.
pub fn run_threads<T, F>(size: usize, worker: F) -> Vec<Result<T, RelaxError>>
where
    T: Send,
    F: Fn(ThreadComm) -> Result<T, RelaxError> + Sync,
{
    if size == 0 {
        return vec![Err(RelaxError::InvalidConfig(
            "a worker group needs at least one worker".to_string(),
        ))];
    }
    debug!(size, "spawning worker group");
    let comms = ThreadComm::world(size);
    std::thread::scope(|s| {
        let handles: Vec<_> = comms
            .into_iter()
            .map(|comm| {
                let worker = &worker;
                s.spawn(move || worker(comm))
            })
            .collect();
        handles
            .into_iter()
            .enumerate()
            .map(|(rank, h)| {
                h.join().unwrap_or_else(|_| {
                    Err(RelaxError::CommunicationFailure(format!("worker {rank} panicked")))
                })
            })
            .collect()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rows_travel_between_threads() {
        let results = run_threads(2, |comm| {
            let mut got = vec![0.0; 3];
            if comm.rank() == 0 {
                comm.send_row(1, &[1.0, 2.0, 3.0])?;
                comm.recv_row(1, &mut got)?;
            } else {
                comm.recv_row(0, &mut got)?;
                comm.send_row(0, &[4.0, 5.0, 6.0])?;
            }
            Ok(got)
        });
        assert_eq!(results[0].as_ref().unwrap(), &vec![4.0, 5.0, 6.0]);
        assert_eq!(results[1].as_ref().unwrap(), &vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn reduction_is_logical_and() {
        for falsy in 0..4 {
            let results = run_threads(4, |comm| comm.all_reduce_and(comm.rank() != falsy));
            assert!(results.into_iter().all(|r| !r.unwrap()));
        }
        let results = run_threads(4, |comm| comm.all_reduce_and(true));
        assert!(results.into_iter().all(|r| r.unwrap()));
    }

    #[test]
    fn length_mismatch_is_a_communication_failure() {
        let results = run_threads(2, |comm| {
            if comm.rank() == 0 {
                comm.send_row(1, &[1.0, 2.0])
            } else {
                let mut row = vec![0.0; 3];
                comm.recv_row(0, &mut row)
            }
        });
        assert!(results[0].is_ok());
        assert!(matches!(results[1], Err(RelaxError::CommunicationFailure(_))));
    }

    #[test]
    fn departed_peer_is_detected() {
        let results = run_threads(2, |comm| {
            if comm.rank() == 0 {
                Ok(())
            } else {
                let mut row = vec![0.0; 1];
                comm.recv_row(0, &mut row)
            }
        });
        assert!(results[0].is_ok());
        assert!(matches!(results[1], Err(RelaxError::CommunicationFailure(_))));
    }

    #[test]
    fn empty_group_is_an_error() {
        let results = run_threads(0, |comm| Ok(comm.rank()));
        assert_eq!(results.len(), 1);
        assert!(matches!(results[0], Err(RelaxError::InvalidConfig(_))));
    }

    #[test]
    fn single_worker_reduces_to_its_own_flag() {
        let comm = ThreadComm::world(1).pop().unwrap();
        assert!(!comm.all_reduce_and(false).unwrap());
        assert!(comm.barrier().is_ok());
    }
}
