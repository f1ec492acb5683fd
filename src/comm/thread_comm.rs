use super::*;
use std::sync::mpsc::{channel, Receiver, Sender};

/// Endpoint for one of several workers running as threads of this process.
/// Each ordered pair of workers has its own unbounded channel.
pub struct ThreadComm {
    rank: usize,
    size: usize,
    senders: Vec<Option<Sender<Vec<f64>>>>,
    receivers: Vec<Option<Receiver<Vec<f64>>>>,
}

impl ThreadComm {
    /// Create `size` connected endpoints, indexed by rank.
    pub fn create(size: usize) -> Vec<ThreadComm> {
        let mut senders: Vec<Vec<Option<Sender<Vec<f64>>>>> =
            (0..size).map(|_| (0..size).map(|_| None).collect()).collect();
        let mut receivers: Vec<Vec<Option<Receiver<Vec<f64>>>>> =
            (0..size).map(|_| (0..size).map(|_| None).collect()).collect();
        for source in 0..size {
            for dest in 0..size {
                if source == dest {
                    continue;
                }
                let (tx, rx) = channel();
                senders[source][dest] = Some(tx);
                receivers[dest][source] = Some(rx);
            }
        }

        senders
            .into_iter()
            .zip(receivers)
            .enumerate()
            .map(|(rank, (senders, receivers))| ThreadComm {
                rank,
                size,
                senders,
                receivers,
            })
            .collect()
    }
}

impl Communicator for ThreadComm {
    fn rank(&self) -> usize {
        self.rank
    }

    fn size(&self) -> usize {
        self.size
    }

    fn send(&self, dest: usize, data: Vec<f64>) -> HeatResult<()> {
        let sender = self
            .senders
            .get(dest)
            .and_then(|s| s.as_ref())
            .ok_or_else(|| {
                HeatError::Communication(format!(
                    "rank {} has no channel to rank {dest}",
                    self.rank
                ))
            })?;
        sender.send(data).map_err(|_| {
            HeatError::Communication(format!(
                "rank {dest} hung up before rank {} could send",
                self.rank
            ))
        })
    }

    fn recv(&self, source: usize) -> HeatResult<Vec<f64>> {
        let receiver = self
            .receivers
            .get(source)
            .and_then(|r| r.as_ref())
            .ok_or_else(|| {
                HeatError::Communication(format!(
                    "rank {} has no channel from rank {source}",
                    self.rank
                ))
            })?;
        receiver.recv().map_err(|_| {
            HeatError::Communication(format!(
                "rank {source} hung up before rank {} could receive",
                self.rank
            ))
        })
    }
}

/// Run `f` on `n_workers` threads, one `ThreadComm` each.
/// Results come back in rank order.
pub fn run_workers<T, F>(n_workers: usize, f: F) -> Vec<T>
where
    T: Send,
    F: Fn(ThreadComm) -> T + Sync,
{
    let comms = ThreadComm::create(n_workers);
    let f = &f;
    std::thread::scope(|scope| {
        let handles: Vec<_> = comms
            .into_iter()
            .map(|comm| {
                std::thread::Builder::new()
                    .name(format!("worker_{}", comm.rank()))
                    .spawn_scoped(scope, move || f(comm))
            })
            .collect();
        handles
            .into_iter()
            .map(|handle| match handle {
                Ok(handle) => match handle.join() {
                    Ok(result) => result,
                    Err(panic) => std::panic::resume_unwind(panic),
                },
                Err(e) => panic!("ERROR: failed to spawn worker thread, {e}"),
            })
            .collect()
    })
}
