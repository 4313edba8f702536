//! File and timing helpers

use crate::Result;
use serde::{de::DeserializeOwned, Serialize};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

/// Save object to a JSON file, creating parent directories
pub fn save_json<T: Serialize + ?Sized>(obj: &T, path: &Path) -> Result<()> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(dir)?;
    }
    let mut writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer(&mut writer, obj)?;
    writer.flush()?;
    Ok(())
}

/// Load object from a JSON file
pub fn load_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let reader = BufReader::new(File::open(path)?);
    Ok(serde_json::from_reader(reader)?)
}

/// Timing utilities
pub mod timing {
    use log::trace;
    use std::time::Instant;

    /// Wall-clock timer that logs its lifetime when dropped
    pub struct Timer {
        start: Instant,
        name: String,
    }

    impl Timer {
        /// Start new timer
        pub fn new(name: &str) -> Self {
            Timer {
                start: Instant::now(),
                name: name.to_string(),
            }
        }

        /// Seconds since start
        pub fn elapsed(&self) -> f64 {
            self.start.elapsed().as_secs_f64()
        }

        /// Seconds since start, restarting the clock
        pub fn lap(&mut self) -> f64 {
            let now = Instant::now();
            let secs = now.duration_since(self.start).as_secs_f64();
            self.start = now;
            secs
        }
    }

    impl Drop for Timer {
        fn drop(&mut self) {
            trace!("{}: {:.6}s", self.name, self.elapsed());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn test_json_round_trip_creates_dirs() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("nested/dir/values.json");
        let values: BTreeMap<String, u32> = [("a".to_string(), 1), ("b".to_string(), 2)].into();

        save_json(&values, &path).unwrap();
        let back: BTreeMap<String, u32> = load_json(&path).unwrap();
        assert_eq!(back, values);
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let result: Result<u32> = load_json(Path::new("/definitely/not/here.json"));
        assert!(matches!(result, Err(crate::QuadInvError::IoError(_))));
    }

    #[test]
    fn test_timer_lap_restarts() {
        let mut timer = timing::Timer::new("test");
        std::thread::sleep(std::time::Duration::from_millis(20));
        let first = timer.lap();
        assert!(first >= 0.02);
        // measured from the lap, not from creation
        assert!(timer.elapsed() < 0.02);
    }
}
