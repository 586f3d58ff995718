//! HTML pages.
//!
//! Every page is a minijinja template rendered from a fresh [`Environment`].
//! Templates are registered with an `.html` name so values are auto-escaped.
//! Pages contain plain forms only; nothing depends on JavaScript.

use crate::ids::WorkoutId;
use crate::workout::{format_timer, WorkoutTimer};
use minijinja::{context, Environment};
use serde::Serialize;

pub const CONFIG_PAGE_TITLE: &str = "FastRunningFriend Configuration";
pub const REVIEW_PAGE_TITLE: &str = "Workout Review";
pub const WORKOUT_PAGE_TITLE: &str = "Workout Details";

/// Body for unsupported methods.
pub const METHOD_ERROR: &str =
    "<html><head><title>Illegal request</title></head><body>Error in request.</body></html>";

/// Body for unknown paths.
pub const NOT_FOUND_ERROR: &str =
    "<html><head><title>Not found</title></head><body>Page not found.</body></html>";

/// Body for requests that failed internally.
pub const INTERNAL_ERROR: &str =
    "<html><head><title>Internal error</title></head><body>Internal error.</body></html>";

const LAYOUT: &str = r#"<html><head><title>{{ title }}</title></head><body><h1>{{ title }}</h1>
<table><tr>{% for item in nav %}{% if item.current %}<td>{{ item.title }}</td>{% else %}<td><a href="/{{ item.url }}">{{ item.title }}</a></td>{% endif %}{% endfor %}</tr></table>
{% block content %}{% endblock %}
</body></html>
"#;

const CONFIG_FORM: &str = r#"{% extends "layout.html" %}{% block content %}
{% if message %}<p>{{ message }}</p>
{% endif %}<form method="post"><table border="1">
{% for var in vars %}<tr><td>{{ var.label }}</td><td><input name="{{ var.label }}" type="{% if var.is_password %}password{% else %}text{% endif %}" size="40" value="{{ var.value }}"></td></tr>
{% endfor %}<tr><td colspan="2" align="center"><input type="submit" name="submit" value="Update Configuration"></td></tr></table>
</form>{% endblock %}"#;

const REVIEW_LIST: &str = r#"{% extends "layout.html" %}{% block content %}
{% if error %}{{ error }}
{% else %}<table>
{% for w in workouts %}<tr><td><a href="/workout/{{ w.id }}">{{ w.name }}</a></td></tr>
{% endfor %}</table>{% endif %}{% endblock %}"#;

const WORKOUT_DETAIL: &str = r#"{% extends "layout.html" %}{% block content %}
{% if not date %}Missing workout date<br>
{% else %}<h2>Workout details for {{ date }}</h2>
{% if message %}{{ message }}<br>
{% endif %}{% if error %}{{ error }}
{% else %}<form method="post">
<table>
{% for leg in legs %}<tr><td>Leg {{ leg.number }}</td><td>Distance:</td><td>{{ leg.distance }}</td><td>Time:</td><td>{{ leg.time }}</td></tr>
{% for s in leg.splits %}<tr><td>Split {{ s.number }}</td><td>Distance:</td><td><input name="d_{{ s.leg }}_{{ s.split }}" type="text" size="7" value="{{ s.distance }}"></td><td>Time:</td><td><input name="t_{{ s.leg }}_{{ s.split }}" type="text" value="{{ s.time }}"></td></tr>
{% endfor %}{% endfor %}<tr><td colspan="5"><input type="submit" value="Update"></td></tr></table></form>
{% endif %}{% endif %}{% endblock %}"#;

/// Pages reachable from the navigation menu.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Nav {
    Config,
    Review,
    None,
}

#[derive(Serialize)]
struct NavItem {
    title: &'static str,
    url: &'static str,
    current: bool,
}

fn nav_items(current: Nav) -> Vec<NavItem> {
    vec![
        NavItem {
            title: "Configuration",
            url: "config",
            current: current == Nav::Config,
        },
        NavItem {
            title: "Workout Review",
            url: "review",
            current: current == Nav::Review,
        },
    ]
}

fn environment() -> Result<Environment<'static>, minijinja::Error> {
    let mut env = Environment::new();
    env.add_template("layout.html", LAYOUT)?;
    env.add_template("config.html", CONFIG_FORM)?;
    env.add_template("review.html", REVIEW_LIST)?;
    env.add_template("workout.html", WORKOUT_DETAIL)?;
    Ok(env)
}

fn render<S: Serialize>(name: &str, ctx: S) -> Result<String, minijinja::Error> {
    let env = environment()?;
    env.get_template(name)?.render(ctx)
}

/// One row of the configuration form.
#[derive(Debug, Clone, Serialize)]
pub struct ConfigField {
    pub label: String,
    pub is_password: bool,
    pub value: String,
}

pub fn config_form(message: Option<&str>, fields: &[ConfigField]) -> Result<String, minijinja::Error> {
    render(
        "config.html",
        context! {
            title => CONFIG_PAGE_TITLE,
            nav => nav_items(Nav::Config),
            message => message,
            vars => fields,
        },
    )
}

#[derive(Serialize)]
struct WorkoutLink {
    id: String,
    name: String,
}

/// Workout list, or `error` in its place when the data directory is unreadable.
pub fn review_list(workouts: &[WorkoutId], error: Option<&str>) -> Result<String, minijinja::Error> {
    let links: Vec<WorkoutLink> = workouts
        .iter()
        .map(|id| WorkoutLink {
            id: id.to_string(),
            name: id.to_string(),
        })
        .collect();
    render(
        "review.html",
        context! {
            title => REVIEW_PAGE_TITLE,
            nav => nav_items(Nav::Review),
            workouts => links,
            error => error,
        },
    )
}

#[derive(Serialize)]
struct SplitView {
    number: usize,
    leg: usize,
    split: usize,
    distance: String,
    time: String,
}

#[derive(Serialize)]
struct LegView {
    number: usize,
    distance: String,
    time: String,
    splits: Vec<SplitView>,
}

fn leg_views(timer: &WorkoutTimer) -> Vec<LegView> {
    timer
        .legs()
        .iter()
        .enumerate()
        .map(|(li, leg)| LegView {
            number: li + 1,
            distance: format!("{:.3}", leg.total_distance()),
            time: format_timer(leg.total_time()),
            splits: leg
                .splits()
                .iter()
                .enumerate()
                .map(|(si, s)| SplitView {
                    number: si + 1,
                    leg: li,
                    split: si,
                    distance: format!("{:.3}", s.delta_d),
                    time: format_timer(s.delta_t),
                })
                .collect(),
        })
        .collect()
}

/// What the workout detail page shows below its heading.
pub enum WorkoutView<'a> {
    /// The path carried no workout identifier
    MissingId,
    Loaded(&'a WorkoutId, &'a WorkoutTimer),
    Failed(&'a WorkoutId, &'a str),
}

pub fn workout_detail(message: Option<&str>, view: WorkoutView<'_>) -> Result<String, minijinja::Error> {
    let (date, legs, error) = match view {
        WorkoutView::MissingId => (None, Vec::new(), None),
        WorkoutView::Loaded(id, timer) => (Some(id.display_name()), leg_views(timer), None),
        WorkoutView::Failed(id, err) => (Some(id.display_name()), Vec::new(), Some(err)),
    };
    render(
        "workout.html",
        context! {
            title => WORKOUT_PAGE_TITLE,
            nav => nav_items(Nav::None),
            date => date,
            message => message,
            error => error,
            legs => legs,
        },
    )
}
