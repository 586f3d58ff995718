use chrono::NaiveDateTime;
use rand::Rng;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt::{Display, Formatter};
use std::str::FromStr;

/// Length of a rendered session token.
pub const SESSION_ID_LEN: usize = 32;

/// Opaque session token carried in the `session` cookie.
///
/// Built from four non-cryptographic 32-bit draws rendered as uppercase hex,
/// each zero padded so the token is always 32 characters.
#[derive(Clone, Eq, PartialEq, Hash, Debug)]
pub struct SessionId(String);

impl SessionId {
    /// Draw a fresh token from the given generator.
    pub fn generate<R: Rng + ?Sized>(rng: &mut R) -> Self {
        let parts: [u32; 4] = [rng.gen(), rng.gen(), rng.gen(), rng.gen()];
        Self(format!(
            "{:08X}{:08X}{:08X}{:08X}",
            parts[0], parts[1], parts[2], parts[3]
        ))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for SessionId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Error parsing a [`SessionId`] from a cookie value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidSessionId;

impl Display for InvalidSessionId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "session id must be {} hex digits", SESSION_ID_LEN)
    }
}

impl std::error::Error for InvalidSessionId {}

impl FromStr for SessionId {
    type Err = InvalidSessionId;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() == SESSION_ID_LEN && s.bytes().all(|b| b.is_ascii_hexdigit()) {
            Ok(SessionId(s.to_ascii_uppercase()))
        } else {
            Err(InvalidSessionId)
        }
    }
}

impl Serialize for SessionId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for SessionId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse::<SessionId>()
            .map_err(|_| serde::de::Error::custom("invalid session id"))
    }
}

/// Identifier of a recorded workout, also the stem of its data file.
///
/// Workouts are named after their start time (`YYYY-MM-DD-HH-MM-SS`), but any
/// name made of ASCII alphanumerics, `-`, `_` and `.` (not leading) is accepted
/// so the identifier can never address a file outside the data directory.
#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug)]
pub struct WorkoutId(String);

impl WorkoutId {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Start time encoded in the identifier, if it follows the date naming.
    pub fn started_at(&self) -> Option<NaiveDateTime> {
        NaiveDateTime::parse_from_str(&self.0, "%Y-%m-%d-%H-%M-%S").ok()
    }

    /// Heading text for the workout: the start time when the identifier
    /// encodes one, the raw identifier otherwise.
    pub fn display_name(&self) -> String {
        match self.started_at() {
            Some(ts) => ts.format("%Y-%m-%d %H:%M:%S").to_string(),
            None => self.0.clone(),
        }
    }
}

impl Display for WorkoutId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Error parsing a [`WorkoutId`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidWorkoutId(pub String);

impl Display for InvalidWorkoutId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "invalid workout id '{}'", self.0)
    }
}

impl std::error::Error for InvalidWorkoutId {}

impl FromStr for WorkoutId {
    type Err = InvalidWorkoutId;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let valid = !s.is_empty()
            && !s.starts_with('.')
            && s
                .bytes()
                .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_' | b'.'));
        if valid {
            Ok(WorkoutId(s.to_string()))
        } else {
            Err(InvalidWorkoutId(s.to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_generated_session_id_is_32_uppercase_hex() {
        let mut rng = StdRng::seed_from_u64(7);
        let id = SessionId::generate(&mut rng);
        assert_eq!(id.as_str().len(), SESSION_ID_LEN);
        assert!(id
            .as_str()
            .chars()
            .all(|c| c.is_ascii_digit() || ('A'..='F').contains(&c)));
        assert_eq!(id.as_str().parse::<SessionId>(), Ok(id));
    }

    #[test]
    fn test_session_id_rejects_garbage() {
        assert!("abc".parse::<SessionId>().is_err());
        assert!("Z".repeat(32).parse::<SessionId>().is_err());
    }

    #[test]
    fn test_workout_id_rejects_traversal() {
        assert!("../etc/passwd".parse::<WorkoutId>().is_err());
        assert!(".hidden".parse::<WorkoutId>().is_err());
        assert!("".parse::<WorkoutId>().is_err());
        assert!("a/b".parse::<WorkoutId>().is_err());
    }

    #[test]
    fn test_workout_id_display_name() {
        let id: WorkoutId = "2013-05-04-07-30-15".parse().unwrap();
        assert_eq!(id.display_name(), "2013-05-04 07:30:15");
        let plain: WorkoutId = "long_run".parse().unwrap();
        assert_eq!(plain.display_name(), "long_run");
    }
}
