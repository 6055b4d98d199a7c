use convert_case::{Case, Casing};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A name together with the forms derived from it.
///
/// Only the base name is stored and serialized. Every other form (singular,
/// plural, camel, pascal, snake, upper-snake) is computed on demand, so the
/// manifest and API compilers can never disagree on how a name is spelled.
///
/// # Example
///
/// ```
/// use mug_scaffold::model::Identifier;
///
/// let ident = Identifier::new("courseEnrollment");
/// assert_eq!(ident.plural_camel(), "courseEnrollments");
/// assert_eq!(ident.pascal(), "CourseEnrollment");
/// assert_eq!(ident.upper_snake(), "COURSE_ENROLLMENT");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Identifier(String);

impl Identifier {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the base name singularized.
    pub fn singular(&self) -> String {
        singularize(&self.0)
    }

    /// Returns the base name pluralized. Already plural names stay as they are.
    pub fn plural(&self) -> String {
        pluralize(&self.singular())
    }

    pub fn camel(&self) -> String {
        self.0.to_case(Case::Camel)
    }

    pub fn pascal(&self) -> String {
        self.0.to_case(Case::Pascal)
    }

    pub fn snake(&self) -> String {
        self.0.to_case(Case::Snake)
    }

    pub fn upper_snake(&self) -> String {
        self.snake().to_uppercase()
    }

    pub fn singular_camel(&self) -> String {
        singularize(&self.camel())
    }

    pub fn plural_camel(&self) -> String {
        pluralize(&self.singular_camel())
    }

    pub fn singular_pascal(&self) -> String {
        singularize(&self.pascal())
    }

    pub fn plural_pascal(&self) -> String {
        pluralize(&self.singular_pascal())
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Identifier {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for Identifier {
    fn from(name: String) -> Self {
        Self(name)
    }
}

/// Words spelled the same in singular and plural.
const INVARIANT: &[&str] = &["series", "species", "news"];

/// Singular stems ending in `-us` whose plural adds `-es`.
const US_STEMS: &[&str] = &[
    "status", "bus", "campus", "virus", "bonus", "census", "focus", "genus", "corpus", "apparatus",
];

fn is_invariant(s: &str) -> bool {
    ends_with_any(&s.to_lowercase(), INVARIANT)
}

fn pluralize(s: &str) -> String {
    if s.is_empty() || is_invariant(s) {
        return s.to_string();
    }
    if s.ends_with('s')
        || s.ends_with('x')
        || s.ends_with('z')
        || s.ends_with("sh")
        || s.ends_with("ch")
    {
        format!("{s}es")
    } else if s.ends_with('y') && !ends_with_any(s, &["ay", "ey", "iy", "oy", "uy"]) {
        format!("{}ies", &s[..s.len() - 1])
    } else {
        format!("{s}s")
    }
}

fn singularize(s: &str) -> String {
    if is_invariant(s) {
        s.to_string()
    } else if s.len() > 3 && s.ends_with("ies") {
        format!("{}y", &s[..s.len() - 3])
    } else if ends_with_any(s, &["sses", "shes", "ches", "xes", "zzes"]) {
        s[..s.len() - 2].to_string()
    } else if s.ends_with("uses") {
        let stem = &s[..s.len() - 2];
        if ends_with_any(&stem.to_lowercase(), US_STEMS) {
            stem.to_string()
        } else {
            s[..s.len() - 1].to_string()
        }
    } else if ends_with_any(s, &["ss", "us", "is"]) {
        s.to_string()
    } else if s.len() > 1 && s.ends_with('s') {
        s[..s.len() - 1].to_string()
    } else {
        s.to_string()
    }
}

fn ends_with_any(s: &str, suffixes: &[&str]) -> bool {
    suffixes.iter().any(|suffix| s.ends_with(suffix))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plural_forms() {
        assert_eq!(Identifier::new("course").plural(), "courses");
        assert_eq!(Identifier::new("category").plural(), "categories");
        assert_eq!(Identifier::new("status").plural(), "statuses");
        assert_eq!(Identifier::new("box").plural(), "boxes");
        assert_eq!(Identifier::new("key").plural(), "keys");
    }

    #[test]
    fn plural_of_plural_is_stable() {
        assert_eq!(Identifier::new("courses").plural(), "courses");
        assert_eq!(Identifier::new("categories").plural(), "categories");
        assert_eq!(Identifier::new("addresses").plural(), "addresses");
    }

    #[test]
    fn singular_forms() {
        assert_eq!(Identifier::new("courses").singular(), "course");
        assert_eq!(Identifier::new("companies").singular(), "company");
        assert_eq!(Identifier::new("statuses").singular(), "status");
        assert_eq!(Identifier::new("class").singular(), "class");
        assert_eq!(Identifier::new("enrollment").singular(), "enrollment");
    }

    #[test]
    fn irregular_endings() {
        assert_eq!(Identifier::new("houses").singular(), "house");
        assert_eq!(Identifier::new("house").plural(), "houses");
        assert_eq!(Identifier::new("courseStatuses").singular_camel(), "courseStatus");
        assert_eq!(Identifier::new("buses").singular(), "bus");
        assert_eq!(Identifier::new("series").singular(), "series");
        assert_eq!(Identifier::new("series").plural(), "series");
        assert_eq!(Identifier::new("tvSeries").plural_camel(), "tvSeries");
        assert_eq!(Identifier::new("quizzes").singular(), "quiz");
    }

    #[test]
    fn case_forms() {
        let ident = Identifier::new("user_profile");
        assert_eq!(ident.camel(), "userProfile");
        assert_eq!(ident.pascal(), "UserProfile");
        assert_eq!(ident.upper_snake(), "USER_PROFILE");
        assert_eq!(ident.plural_camel(), "userProfiles");
        assert_eq!(ident.plural_pascal(), "UserProfiles");
    }

    #[test]
    fn serializes_as_bare_string() {
        let json = serde_json::to_string(&Identifier::new("course")).unwrap();
        assert_eq!(json, "\"course\"");
    }
}
