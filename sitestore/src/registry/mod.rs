// Table registry - the closed set of tables the store knows about

use crate::error::StoreError;
use std::fmt;
use std::str::FromStr;

/// A table backed by one JSON file in the data directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Table {
    Menus,
    Pages,
    BlogPosts,
    BlogCategories,
    Categories,
    Services,
    Testimonials,
    Appointments,
    Popups,
    Media,
    Settings,
    Users,
    ContactSubmissions,
    AnalyticsEvents,
}

impl Table {
    pub const ALL: [Table; 14] = [
        Table::Menus,
        Table::Pages,
        Table::BlogPosts,
        Table::BlogCategories,
        Table::Categories,
        Table::Services,
        Table::Testimonials,
        Table::Appointments,
        Table::Popups,
        Table::Media,
        Table::Settings,
        Table::Users,
        Table::ContactSubmissions,
        Table::AnalyticsEvents,
    ];

    /// The table name as it appears in SQL text.
    pub fn name(self) -> &'static str {
        match self {
            Table::Menus => "menus",
            Table::Pages => "pages",
            Table::BlogPosts => "blog_posts",
            Table::BlogCategories => "blog_categories",
            Table::Categories => "categories",
            Table::Services => "services",
            Table::Testimonials => "testimonials",
            Table::Appointments => "appointments",
            Table::Popups => "popups",
            Table::Media => "media",
            Table::Settings => "settings",
            Table::Users => "users",
            Table::ContactSubmissions => "contact_submissions",
            Table::AnalyticsEvents => "analytics_events",
        }
    }

    /// Backing file name, relative to the data directory.
    pub fn file_name(self) -> &'static str {
        match self {
            Table::Menus => "menus.json",
            Table::Pages => "pages.json",
            Table::BlogPosts => "blog_posts.json",
            Table::BlogCategories => "blog_categories.json",
            Table::Categories => "categories.json",
            Table::Services => "services.json",
            Table::Testimonials => "testimonials.json",
            Table::Appointments => "appointments.json",
            Table::Popups => "popups.json",
            Table::Media => "media.json",
            Table::Settings => "settings.json",
            Table::Users => "users.json",
            Table::ContactSubmissions => "contact_submissions.json",
            Table::AnalyticsEvents => "analytics_events.json",
        }
    }

    /// Resolve a textual table name. Unknown names yield `None`.
    pub fn lookup(name: &str) -> Option<Table> {
        let name = name.trim_matches(|c| c == '`' || c == '"');
        Table::ALL
            .iter()
            .copied()
            .find(|t| t.name().eq_ignore_ascii_case(name))
    }

    /// Position of this table in `Table::ALL`, used to index per-table state.
    pub(crate) fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Table {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Table::lookup(s).ok_or_else(|| StoreError::UnknownTable(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_is_case_insensitive() {
        assert_eq!(Table::lookup("pages"), Some(Table::Pages));
        assert_eq!(Table::lookup("BLOG_POSTS"), Some(Table::BlogPosts));
        assert_eq!(Table::lookup("`menus`"), Some(Table::Menus));
    }

    #[test]
    fn test_unknown_table() {
        assert_eq!(Table::lookup("orders"), None);
        let err = "orders".parse::<Table>().unwrap_err();
        assert!(matches!(err, StoreError::UnknownTable(name) if name == "orders"));
    }

    #[test]
    fn test_file_names_match_names() {
        for table in Table::ALL {
            assert_eq!(table.file_name(), format!("{}.json", table.name()));
        }
    }

    #[test]
    fn test_index_matches_position() {
        for (i, table) in Table::ALL.iter().enumerate() {
            assert_eq!(table.index(), i);
        }
    }
}
