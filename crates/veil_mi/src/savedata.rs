//! Binary checkpoints of accumulated sampling statistics.

use std::io::{Read, Write};

use veil_common::BuildHash;

use crate::error::SaveDataError;

/// One checkpoint of accumulated per-slot MI sums.
///
/// The on-disk layout is fixed and little-endian:
///
/// ```text
/// [64-byte build hash]
/// [u32 cycles] [u64 nfd] [u64 nfds] [u64 num_secrets]
/// [u64 num_runs] [u64 duration_ms] [u64 run_length]
/// [f64 × run_length]
/// ```
///
/// Two checkpoints are compatible when every header field matches;
/// merging sums `num_runs`, `duration_ms` and the per-slot
/// accumulators.
#[derive(Clone, Debug)]
pub struct SaveData {
    /// Hash of the program that produced the statistics.
    pub hash: BuildHash,
    /// Number of simulated cycles per run.
    pub cycles: u32,
    /// Samples per H(F|D=d) histogram.
    pub num_samples_f_given_d: u64,
    /// Samples per H(F|D=d,S=s) histogram.
    pub num_samples_f_given_ds: u64,
    /// Secret draws averaged per data draw.
    pub num_secrets: u64,
    /// Completed outer runs (data draws).
    pub num_runs: u64,
    /// Accumulated wall-clock sampling time.
    pub duration_ms: u64,
    /// Per-slot sums of the per-run MI estimates; the length is the
    /// program's run length.
    pub sumof_mi: Vec<f64>,
}

fn read_u32<R: Read>(r: &mut R) -> std::io::Result<u32> {
    let mut buf = [0u8; 4];
    r.read_exact(&mut buf)?;
    Ok(u32::from_le_bytes(buf))
}

fn read_u64<R: Read>(r: &mut R) -> std::io::Result<u64> {
    let mut buf = [0u8; 8];
    r.read_exact(&mut buf)?;
    Ok(u64::from_le_bytes(buf))
}

fn read_f64<R: Read>(r: &mut R) -> std::io::Result<f64> {
    let mut buf = [0u8; 8];
    r.read_exact(&mut buf)?;
    Ok(f64::from_le_bytes(buf))
}

impl SaveData {
    /// Reads a checkpoint, rejecting it when `expected_hash` is given
    /// and the stored hash differs.
    pub fn read<R: Read>(
        mut input: R,
        expected_hash: Option<BuildHash>,
    ) -> Result<SaveData, SaveDataError> {
        let mut hash_bytes = [0u8; 64];
        input.read_exact(&mut hash_bytes)?;
        let hash = BuildHash::from_bytes(hash_bytes);
        if let Some(expected) = expected_hash {
            if hash != expected {
                return Err(SaveDataError::HashMismatch);
            }
        }

        let cycles = read_u32(&mut input)?;
        let num_samples_f_given_d = read_u64(&mut input)?;
        let num_samples_f_given_ds = read_u64(&mut input)?;
        let num_secrets = read_u64(&mut input)?;
        let num_runs = read_u64(&mut input)?;
        let duration_ms = read_u64(&mut input)?;
        let run_length = read_u64(&mut input)?;
        let mut sumof_mi = Vec::with_capacity(run_length as usize);
        for _ in 0..run_length {
            sumof_mi.push(read_f64(&mut input)?);
        }

        Ok(SaveData {
            hash,
            cycles,
            num_samples_f_given_d,
            num_samples_f_given_ds,
            num_secrets,
            num_runs,
            duration_ms,
            sumof_mi,
        })
    }

    /// Writes the checkpoint in its fixed binary layout.
    pub fn write<W: Write>(&self, mut output: W) -> Result<(), SaveDataError> {
        output.write_all(self.hash.as_bytes())?;
        output.write_all(&self.cycles.to_le_bytes())?;
        output.write_all(&self.num_samples_f_given_d.to_le_bytes())?;
        output.write_all(&self.num_samples_f_given_ds.to_le_bytes())?;
        output.write_all(&self.num_secrets.to_le_bytes())?;
        output.write_all(&self.num_runs.to_le_bytes())?;
        output.write_all(&self.duration_ms.to_le_bytes())?;
        output.write_all(&(self.sumof_mi.len() as u64).to_le_bytes())?;
        for value in &self.sumof_mi {
            output.write_all(&value.to_le_bytes())?;
        }
        Ok(())
    }

    /// Checks that the checkpoint matches the current sampling
    /// configuration.
    pub fn validate(
        &self,
        cycles: u32,
        num_samples_f_given_d: u64,
        num_samples_f_given_ds: u64,
        num_secrets: u64,
        run_length: u64,
    ) -> Result<(), SaveDataError> {
        if self.cycles != cycles {
            return Err(SaveDataError::ParamMismatch { field: "cycles" });
        }
        if self.num_samples_f_given_d != num_samples_f_given_d {
            return Err(SaveDataError::ParamMismatch { field: "num_samples_f_given_d" });
        }
        if self.num_samples_f_given_ds != num_samples_f_given_ds {
            return Err(SaveDataError::ParamMismatch { field: "num_samples_f_given_ds" });
        }
        if self.num_secrets != num_secrets {
            return Err(SaveDataError::ParamMismatch { field: "num_secrets" });
        }
        if self.sumof_mi.len() as u64 != run_length {
            return Err(SaveDataError::ParamMismatch { field: "run_length" });
        }
        Ok(())
    }

    /// Adds another checkpoint's statistics into this one.
    ///
    /// Every header field must match; `num_runs`, `duration_ms` and
    /// the per-slot sums are added.
    pub fn merge(&mut self, other: &SaveData) -> Result<(), SaveDataError> {
        if self.hash != other.hash {
            return Err(SaveDataError::HashMismatch);
        }
        other.validate(
            self.cycles,
            self.num_samples_f_given_d,
            self.num_samples_f_given_ds,
            self.num_secrets,
            self.sumof_mi.len() as u64,
        )?;

        self.num_runs += other.num_runs;
        self.duration_ms += other.duration_ms;
        for (acc, value) in self.sumof_mi.iter_mut().zip(&other.sumof_mi) {
            *acc += value;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(hash: &str, num_runs: u64, sums: Vec<f64>) -> SaveData {
        SaveData {
            hash: BuildHash::of_text(hash),
            cycles: 2,
            num_samples_f_given_d: 64,
            num_samples_f_given_ds: 64,
            num_secrets: 1,
            num_runs,
            duration_ms: 10,
            sumof_mi: sums,
        }
    }

    #[test]
    fn roundtrip_preserves_everything() {
        let data = sample("p", 5, vec![0.25, -0.5, 1.0]);
        let mut buf = Vec::new();
        data.write(&mut buf).unwrap();
        let back = SaveData::read(&buf[..], Some(data.hash)).unwrap();
        assert_eq!(back.hash, data.hash);
        assert_eq!(back.cycles, data.cycles);
        assert_eq!(back.num_runs, data.num_runs);
        assert_eq!(back.duration_ms, data.duration_ms);
        assert_eq!(back.sumof_mi, data.sumof_mi);
    }

    #[test]
    fn layout_is_fixed_and_little_endian() {
        let data = sample("p", 1, vec![1.0]);
        let mut buf = Vec::new();
        data.write(&mut buf).unwrap();
        assert_eq!(buf.len(), 64 + 4 + 8 * 6 + 8);
        assert_eq!(&buf[..64], data.hash.as_bytes());
        assert_eq!(&buf[64..68], &2u32.to_le_bytes());
        assert_eq!(&buf[buf.len() - 8..], &1.0f64.to_le_bytes());
    }

    #[test]
    fn wrong_hash_is_rejected() {
        let data = sample("p", 1, vec![1.0]);
        let mut buf = Vec::new();
        data.write(&mut buf).unwrap();
        let err = SaveData::read(&buf[..], Some(BuildHash::of_text("other"))).unwrap_err();
        assert!(matches!(err, SaveDataError::HashMismatch));
    }

    #[test]
    fn validate_rejects_parameter_drift() {
        let data = sample("p", 1, vec![1.0]);
        assert!(data.validate(2, 64, 64, 1, 1).is_ok());
        assert!(matches!(
            data.validate(3, 64, 64, 1, 1),
            Err(SaveDataError::ParamMismatch { field: "cycles" })
        ));
        assert!(matches!(
            data.validate(2, 128, 64, 1, 1),
            Err(SaveDataError::ParamMismatch { field: "num_samples_f_given_d" })
        ));
        assert!(matches!(
            data.validate(2, 64, 64, 1, 9),
            Err(SaveDataError::ParamMismatch { field: "run_length" })
        ));
    }

    #[test]
    fn merge_sums_accumulators() {
        let mut a = sample("p", 3, vec![1.0, 2.0]);
        let b = sample("p", 4, vec![0.5, -1.0]);
        a.merge(&b).unwrap();
        assert_eq!(a.num_runs, 7);
        assert_eq!(a.duration_ms, 20);
        assert_eq!(a.sumof_mi, vec![1.5, 1.0]);
    }

    #[test]
    fn merge_rejects_different_programs() {
        let mut a = sample("p", 1, vec![1.0]);
        let b = sample("q", 1, vec![1.0]);
        assert!(matches!(a.merge(&b), Err(SaveDataError::HashMismatch)));
    }

    #[test]
    fn merge_is_commutative_and_associative() {
        let base = sample("p", 0, vec![0.0, 0.0]);
        let x = sample("p", 1, vec![1.0, 2.0]);
        let y = sample("p", 2, vec![3.0, 4.0]);
        let z = sample("p", 3, vec![5.0, 6.0]);

        let mut xy_z = base.clone();
        xy_z.merge(&x).unwrap();
        xy_z.merge(&y).unwrap();
        xy_z.merge(&z).unwrap();

        let mut zy_x = base;
        zy_x.merge(&z).unwrap();
        zy_x.merge(&y).unwrap();
        zy_x.merge(&x).unwrap();

        assert_eq!(xy_z.num_runs, zy_x.num_runs);
        assert_eq!(xy_z.sumof_mi, zy_x.sumof_mi);
    }
}
