use crate::error::SetupError;
use crate::ids::WorkoutId;
use std::borrow::Cow;

/// Path of the workout detail pages, without the identifier segment.
pub const WORKOUT_PREFIX: &str = "/workout";

/// Page selected for a GET/HEAD (or a POST once its body is consumed).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    Config,
    Review,
    /// Workout detail; `None` when the path carries no identifier
    Workout(Option<WorkoutId>),
    NotFound,
}

/// What a POST body is ingested into.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PostTarget {
    Config,
    Workout(WorkoutId),
    /// Body is consumed and discarded
    Undef,
}

/// Drop the query string and percent-decode the path.
pub fn normalize_path(raw: &str) -> Cow<'_, str> {
    let path = raw.split('?').next().unwrap_or("/");
    urlencoding::decode(path).unwrap_or(Cow::Borrowed(path))
}

/// Resolve a (normalized) path to its page.
pub fn route(path: &str) -> Route {
    match path {
        "/" | "/config" => Route::Config,
        "/review" => Route::Review,
        _ => match workout_segment(path) {
            Some("") => Route::Workout(None),
            Some(seg) => seg
                .parse::<WorkoutId>()
                .map(|id| Route::Workout(Some(id)))
                .unwrap_or(Route::NotFound),
            None => Route::NotFound,
        },
    }
}

/// Classify a POST by its target path.
///
/// Workout paths must carry a valid identifier; anything that is neither the
/// configuration nor a workout path is accepted and discarded.
pub fn classify_post(path: &str) -> Result<PostTarget, SetupError> {
    match route(path) {
        Route::Config => Ok(PostTarget::Config),
        Route::Workout(Some(id)) => Ok(PostTarget::Workout(id)),
        Route::Workout(None) => Err(SetupError::InvalidWorkoutPath {
            path: path.to_string(),
        }),
        Route::NotFound if workout_segment(path).is_some() => Err(SetupError::InvalidWorkoutPath {
            path: path.to_string(),
        }),
        Route::Review | Route::NotFound => Ok(PostTarget::Undef),
    }
}

/// Identifier segment of a workout path (possibly empty), `None` for other paths.
fn workout_segment(path: &str) -> Option<&str> {
    let rest = path.strip_prefix(WORKOUT_PREFIX)?;
    if rest.is_empty() {
        return Some("");
    }
    rest.strip_prefix('/')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_routes() {
        assert_eq!(route("/"), Route::Config);
        assert_eq!(route("/config"), Route::Config);
        assert_eq!(route("/review"), Route::Review);
        assert_eq!(route("/workout"), Route::Workout(None));
        assert_eq!(route("/workout/"), Route::Workout(None));
        assert_eq!(
            route("/workout/2013-05-04-07-30-15"),
            Route::Workout(Some("2013-05-04-07-30-15".parse().unwrap()))
        );
        assert_eq!(route("/workout/a/b"), Route::NotFound);
        assert_eq!(route("/workouts"), Route::NotFound);
        assert_eq!(route("/nope"), Route::NotFound);
    }

    #[test]
    fn test_normalize_strips_query_and_decodes() {
        assert_eq!(normalize_path("/review?x=1"), "/review");
        assert_eq!(normalize_path("/workout/a%2Db"), "/workout/a-b");
    }

    #[test]
    fn test_classify_post() {
        assert_eq!(classify_post("/").unwrap(), PostTarget::Config);
        assert_eq!(classify_post("/config").unwrap(), PostTarget::Config);
        assert_eq!(classify_post("/review").unwrap(), PostTarget::Undef);
        assert_eq!(classify_post("/elsewhere").unwrap(), PostTarget::Undef);
        assert!(matches!(
            classify_post("/workout/w1").unwrap(),
            PostTarget::Workout(_)
        ));
        assert!(classify_post("/workout").is_err());
        assert!(classify_post("/workout/../x").is_err());
    }
}
