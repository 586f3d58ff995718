//! # Router Module
//!
//! Maps request paths to the page that answers them and, for POST requests,
//! to the kind of form data the body carries.
//!
//! | Path | Page | POST body |
//! |---|---|---|
//! | `/`, `/config` | configuration form | configuration values |
//! | `/review` | workout list | discarded |
//! | `/workout/<id>` | workout detail form | split edits for `<id>` |
//! | anything else | 404 | discarded |
//!
//! The choice is made once per request, when it is first seen.

mod core;

pub use self::core::{classify_post, normalize_path, route, PostTarget, Route, WORKOUT_PREFIX};
