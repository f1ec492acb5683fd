use super::*;

/// The only worker, owns every box.
#[derive(Debug, Default, Clone, Copy)]
pub struct SingleWorker;

impl Communicator for SingleWorker {
    fn rank(&self) -> usize {
        0
    }

    fn size(&self) -> usize {
        1
    }

    fn send(&self, dest: usize, _data: Vec<f64>) -> HeatResult<()> {
        Err(HeatError::Communication(format!(
            "single worker cannot send to rank {dest}"
        )))
    }

    fn recv(&self, source: usize) -> HeatResult<Vec<f64>> {
        Err(HeatError::Communication(format!(
            "single worker cannot receive from rank {source}"
        )))
    }
}

#[cfg(test)]
mod unit_tests {
    use super::*;

    #[test]
    fn collectives_test() {
        let comm = SingleWorker;
        comm.barrier().unwrap();
        assert!(comm.all_agree(true).unwrap());
        assert!(!comm.all_agree(false).unwrap());
        assert_eq!(comm.all_gather(vec![2.0]).unwrap(), vec![vec![2.0]]);
        assert!(comm.send(0, vec![]).is_err());
    }
}
