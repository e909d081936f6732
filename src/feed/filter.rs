use crate::error::FeedError;
use crate::{Category, MainTab, Post, UniversityId};

/// Sub-tab names and the tag groups they expand to. A sub-tab matches a post
/// carrying any one of its tags.
const SUB_TABS: &[(&str, &[&str])] = &[
    ("leasing", &["housing", "apartment", "lease", "roommate", "sublet"]),
    (
        "tutoring",
        &["tutoring", "homework", "study", "academic", "math", "science", "english"],
    ),
    ("books", &["textbook", "book", "reading", "course", "education"]),
    ("rides", &["ride", "carpool", "transport", "drive", "travel"]),
    ("food", &["food", "dining", "meal", "cooking", "restaurant"]),
    ("sport", &["event", "sport", "athletic", "game", "tournament", "fitness"]),
    ("rush", &["event", "rush", "greek", "fraternity", "sorority", "recruitment"]),
    (
        "philanthropy",
        &["event", "philanthropy", "charity", "community", "service", "volunteer"],
    ),
    (
        "academic",
        &["event", "academic", "lecture", "workshop", "seminar", "conference"],
    ),
    ("social", &["event", "social", "party", "club", "entertainment", "music"]),
    (
        "cultural",
        &["event", "cultural", "diversity", "heritage", "international", "celebration"],
    ),
];

pub fn sub_tab_tags(sub_tab: &str) -> Option<&'static [&'static str]> {
    SUB_TABS
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case(sub_tab))
        .map(|(_, tags)| *tags)
}

/// Conjunction of scope filters applied before ranking. Empty category/tag
/// lists mean "no constraint"; a non-empty tag list matches any-of.
#[derive(Debug, Clone)]
pub struct FeedFilter {
    pub main_tab: MainTab,
    pub categories: Vec<Category>,
    pub tags: Vec<String>,
    pub university_id: Option<UniversityId>,
}

impl Default for FeedFilter {
    fn default() -> Self {
        Self::for_tab(MainTab::Combined)
    }
}

impl FeedFilter {
    pub fn for_tab(main_tab: MainTab) -> Self {
        Self {
            main_tab,
            categories: Vec::new(),
            tags: Vec::new(),
            university_id: None,
        }
    }

    /// Expands a sub-tab name into its tag group. "all" leaves the filter
    /// untouched; an unknown name is a scope error, caught at the boundary.
    pub fn with_sub_tab(mut self, sub_tab: &str) -> Result<Self, FeedError> {
        if sub_tab.eq_ignore_ascii_case("all") {
            return Ok(self);
        }
        let tags =
            sub_tab_tags(sub_tab).ok_or_else(|| FeedError::invalid_scope("sub tab", sub_tab))?;
        self.tags.extend(tags.iter().map(|t| t.to_string()));
        Ok(self)
    }

    pub fn with_categories(mut self, categories: Vec<Category>) -> Self {
        self.categories = categories;
        self
    }

    pub fn with_tags(mut self, tags: Vec<String>) -> Self {
        self.tags.extend(tags);
        self
    }

    pub fn with_university(mut self, university_id: UniversityId) -> Self {
        self.university_id = Some(university_id);
        self
    }

    pub fn matches(&self, post: &Post) -> bool {
        if !self.main_tab.includes(post.category) {
            return false;
        }
        if !self.categories.is_empty() && !self.categories.contains(&post.category) {
            return false;
        }
        if !self.tags.is_empty() && !self.tags.iter().any(|tag| post.has_tag(tag)) {
            return false;
        }
        if let Some(university_id) = self.university_id {
            if post.university_id != university_id {
                return false;
            }
        }
        true
    }
}
