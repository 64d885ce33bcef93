use revision::revisioned;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A calendar date without a time component.
#[revisioned(revision = 1)]
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
pub struct Date {
	pub year: i16,
	pub month: u8,
	pub day: u8,
}

impl Date {
	pub fn new(year: i16, month: u8, day: u8) -> Self {
		Self {
			year,
			month,
			day,
		}
	}
}

impl fmt::Display for Date {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		write!(f, "{:04}-{:02}-{:02}", self.year, self.month, self.day)
	}
}

/// A wall-clock time without a date component.
#[revisioned(revision = 1)]
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
pub struct Time {
	pub hour: u8,
	pub minute: u8,
	pub sec: u8,
	pub microsec: u32,
}

impl Time {
	pub fn new(hour: u8, minute: u8, sec: u8, microsec: u32) -> Self {
		Self {
			hour,
			minute,
			sec,
			microsec,
		}
	}
}

impl fmt::Display for Time {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		write!(f, "{:02}:{:02}:{:02}.{:06}", self.hour, self.minute, self.sec, self.microsec)
	}
}

/// A combined date and time.
#[revisioned(revision = 1)]
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
pub struct DateTime {
	pub date: Date,
	pub time: Time,
}

impl DateTime {
	pub fn new(date: Date, time: Time) -> Self {
		Self {
			date,
			time,
		}
	}

	/// The current moment in UTC.
	pub fn now() -> Self {
		use chrono::{Datelike, Timelike, Utc};
		let now = Utc::now();
		Self {
			date: Date::new(now.year() as i16, now.month() as u8, now.day() as u8),
			time: Time::new(
				now.hour() as u8,
				now.minute() as u8,
				now.second() as u8,
				now.timestamp_subsec_micros(),
			),
		}
	}
}

impl fmt::Display for DateTime {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		write!(f, "{}T{}", self.date, self.time)
	}
}
