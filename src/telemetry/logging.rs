use std::collections::BTreeMap;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::sync::{Mutex, OnceLock};

#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd)]
enum LogFile {
    Error,
    Looks,
    Packets,
}

impl LogFile {
    const ALL: [LogFile; 3] = [LogFile::Error, LogFile::Looks, LogFile::Packets];

    fn file_name(self) -> &'static str {
        match self {
            LogFile::Error => "error.log",
            LogFile::Looks => "looks.log",
            LogFile::Packets => "packets.log",
        }
    }

    fn has_header(self) -> bool {
        !matches!(self, LogFile::Error)
    }
}

struct Logger {
    files: Mutex<BTreeMap<LogFile, File>>,
}

static LOGGER: OnceLock<Logger> = OnceLock::new();

const HEADER_LINE: &str = "-------------------------------------------------------------------------------";
const HEADER_TITLE: &str = "Locker - per-viewer look rewriting";

const WEEKDAYS: [&str; 7] = ["Thu", "Fri", "Sat", "Sun", "Mon", "Tue", "Wed"];
const MONTHS: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

/// Opens the channel files under `log_dir`. Until this runs every `log_*`
/// call is a no-op, which keeps the library usable without a log directory.
pub fn init(log_dir: &Path) -> Result<(), String> {
    if LOGGER.get().is_some() {
        return Ok(());
    }
    std::fs::create_dir_all(log_dir)
        .map_err(|err| format!("log directory create failed: {}", err))?;

    let mut files = BTreeMap::new();
    for log_file in LogFile::ALL {
        let name = log_file.file_name();
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(log_dir.join(name))
            .map_err(|err| format!("open log {} failed: {}", name, err))?;
        if log_file.has_header() && file.metadata().map(|m| m.len()).unwrap_or(0) == 0 {
            write_header(&mut file, name)?;
        }
        files.insert(log_file, file);
    }

    LOGGER
        .set(Logger {
            files: Mutex::new(files),
        })
        .map_err(|_| "log system already initialized".to_string())?;
    Ok(())
}

pub fn log_error(message: &str) {
    log_timestamped(LogFile::Error, message);
}

/// Registry changes: looks created, swapped and removed.
pub fn log_looks(message: &str) {
    log_timestamped(LogFile::Looks, message);
}

/// Packets that went out unmodified because they could not be rewritten.
pub fn log_packets(message: &str) {
    log_timestamped(LogFile::Packets, message);
}

fn log_timestamped(log_file: LogFile, message: &str) {
    if let Some(logger) = LOGGER.get() {
        let line = format!("{}: {message}\n", Timestamp::now().log_prefix());
        let _ = write_line(logger, log_file, &line);
    }
}

fn write_line(logger: &Logger, log_file: LogFile, line: &str) -> std::io::Result<()> {
    let mut files = logger
        .files
        .lock()
        .map_err(|_| std::io::Error::new(std::io::ErrorKind::Other, "log lock poisoned"))?;
    if let Some(file) = files.get_mut(&log_file) {
        file.write_all(line.as_bytes())?;
        file.flush()?;
    }
    Ok(())
}

fn write_header(file: &mut File, name: &str) -> Result<(), String> {
    let started = Timestamp::now().header();
    write!(file, "{HEADER_LINE}\n{HEADER_TITLE}\n{name} - started {started}\n")
        .map_err(|err| format!("header write failed: {}", err))
}

/// Broken-down UTC time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Timestamp {
    year: i32,
    month: u32,
    day: u32,
    hour: u32,
    minute: u32,
    second: u32,
    weekday: u32,
}

impl Timestamp {
    fn now() -> Self {
        let secs = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_secs() as i64)
            .unwrap_or(0);
        Self::from_unix(secs)
    }

    fn from_unix(secs: i64) -> Self {
        let secs = secs.max(0);
        let days = secs / 86_400;
        let seconds_of_day = (secs % 86_400) as u32;
        let (year, month, day) = civil_from_days(days);
        Self {
            year,
            month,
            day,
            hour: seconds_of_day / 3_600,
            minute: (seconds_of_day % 3_600) / 60,
            second: seconds_of_day % 60,
            // 1970-01-01 was a Thursday
            weekday: (days % 7) as u32,
        }
    }

    fn log_prefix(&self) -> String {
        format!(
            "{:02}.{:02}.{} {:02}:{:02}:{:02}",
            self.day, self.month, self.year, self.hour, self.minute, self.second
        )
    }

    fn header(&self) -> String {
        let weekday = WEEKDAYS[(self.weekday as usize).min(6)];
        let month = MONTHS[(self.month as usize).saturating_sub(1).min(11)];
        format!(
            "{weekday} {month} {:>2} {:02}:{:02}:{:02} {}",
            self.day, self.hour, self.minute, self.second, self.year
        )
    }
}

// Days since the epoch to (year, month, day) in the proleptic Gregorian
// calendar, using 400-year eras that start on March 1st.
fn civil_from_days(days: i64) -> (i32, u32, u32) {
    let z = days + 719_468;
    let era = z.div_euclid(146_097);
    let doe = z - era * 146_097;
    let yoe = (doe - doe / 1_460 + doe / 36_524 - doe / 146_096) / 365;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let day = (doy - (153 * mp + 2) / 5 + 1) as u32;
    let month = if mp < 10 { mp + 3 } else { mp - 9 } as u32;
    let year = (yoe + era * 400 + i64::from(month <= 2)) as i32;
    (year, month, day)
}
