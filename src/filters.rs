//! Fixed option lists for list/filter views and the label helpers that go with them.
//! Every list starts with [`ALL`], the "no filter" value.

pub const ALL: &str = "All";
pub const NOT_AVAILABLE: &str = "N/A";
pub const DEFAULT_BADGE: &str = "bg-gray-100 text-gray-800";

pub const SCHOLARSHIP_CATEGORIES: &[&str] = &[
    ALL,
    "merit-based",
    "need-based",
    "athletic",
    "minority",
    "international",
    "research",
];
pub const SCHOLARSHIP_TYPES: &[&str] = &[
    ALL,
    "full_tuition",
    "partial_tuition",
    "stipend",
    "fellowship",
    "grant",
];
pub const SCHOLARSHIP_STATUSES: &[&str] = &[ALL, "open", "closed", "upcoming", "expired"];
pub const SCHOLARSHIP_LEVELS: &[&str] = &[
    ALL,
    "high_school",
    "bachelors",
    "masters",
    "phd",
    "postdoc",
];

pub const JOB_TYPES: &[&str] = &[
    ALL,
    "full_time",
    "part_time",
    "contract",
    "internship",
    "temporary",
    "remote",
];
pub const JOB_EXPERIENCE: &[&str] = &[ALL, "entry", "1-2 years", "3-5 years", "5+ years"];
pub const JOB_STATUSES: &[&str] = &[ALL, "active", "closed", "draft", "expired"];
pub const JOB_GENDERS: &[&str] = &[ALL, "any", "male", "female"];
pub const JOB_CONTRACT_TYPES: &[&str] = &[
    ALL,
    "permanent",
    "fixed_term",
    "project_based",
    "consultancy",
];

pub const BOOK_FORMATS: &[&str] = &[ALL, "pdf", "epub", "hardcover", "paperback", "audiobook"];
pub const BOOK_LANGUAGES: &[&str] = &[ALL, "en", "fa", "ps"];
pub const BOOK_STATUSES: &[&str] = &[ALL, "available", "unavailable", "archived"];

pub const ARTICLE_STATUSES: &[&str] = &[ALL, "draft", "published", "under_review", "archived"];
pub const ARTICLE_LANGUAGES: &[&str] = &[ALL, "en", "fa", "ps"];

pub const USER_ROLES: &[&str] = &[ALL, "admin", "editor", "author", "user"];
pub const USER_STATUSES: &[&str] = &[ALL, "active", "inactive", "suspended", "pending"];

pub const PAGE_SIZES: &[usize] = &[10, 20, 50, 100];
pub const DEFAULT_PAGE_SIZE: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    Desc,
}

#[derive(Debug, Clone, Copy)]
pub struct SortOption {
    pub field: &'static str,
    pub direction: SortDirection,
    pub label: &'static str,
}

pub const SORT_OPTIONS: &[SortOption] = &[
    SortOption { field: "createdAt", direction: SortDirection::Desc, label: "Newest first" },
    SortOption { field: "createdAt", direction: SortDirection::Asc, label: "Oldest first" },
    SortOption { field: "title", direction: SortDirection::Asc, label: "Title (A-Z)" },
    SortOption { field: "title", direction: SortDirection::Desc, label: "Title (Z-A)" },
    SortOption { field: "updatedAt", direction: SortDirection::Desc, label: "Recently updated" },
];

/// True when a selected filter value means "no filter".
pub fn is_all(selected: &str) -> bool {
    selected.is_empty() || selected == ALL
}

pub fn options_for(entity: &str, field: &str) -> Option<&'static [&'static str]> {
    let options = match (entity, field) {
        ("scholarship", "category") => SCHOLARSHIP_CATEGORIES,
        ("scholarship", "type") => SCHOLARSHIP_TYPES,
        ("scholarship", "status") => SCHOLARSHIP_STATUSES,
        ("scholarship", "level") => SCHOLARSHIP_LEVELS,
        ("job", "type") => JOB_TYPES,
        ("job", "experience") => JOB_EXPERIENCE,
        ("job", "status") => JOB_STATUSES,
        ("job", "gender") => JOB_GENDERS,
        ("job", "contract") => JOB_CONTRACT_TYPES,
        ("book", "format") => BOOK_FORMATS,
        ("book", "language") => BOOK_LANGUAGES,
        ("book", "status") => BOOK_STATUSES,
        ("article", "status") => ARTICLE_STATUSES,
        ("article", "language") => ARTICLE_LANGUAGES,
        ("user", "role") => USER_ROLES,
        ("user", "status") => USER_STATUSES,
        _ => return None,
    };
    Some(options)
}

/// "full_tuition" -> "Full Tuition", "need-based" -> "Need-based".
pub fn get_category_label(token: Option<&str>) -> String {
    let token = match token {
        Some(t) if !t.trim().is_empty() => t,
        _ => return NOT_AVAILABLE.to_string(),
    };
    token
        .split('_')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}

pub fn get_status_badge_color(token: Option<&str>) -> &'static str {
    match token.unwrap_or_default() {
        "active" | "open" | "published" | "approved" | "available" => {
            "bg-green-100 text-green-800"
        }
        "pending" | "draft" | "upcoming" | "under_review" => "bg-yellow-100 text-yellow-800",
        "closed" | "expired" | "rejected" | "inactive" | "suspended" | "unavailable" => {
            "bg-red-100 text-red-800"
        }
        "full_time" => "bg-blue-100 text-blue-800",
        "part_time" => "bg-purple-100 text-purple-800",
        "contract" => "bg-orange-100 text-orange-800",
        "internship" => "bg-indigo-100 text-indigo-800",
        "remote" => "bg-teal-100 text-teal-800",
        _ => DEFAULT_BADGE,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Gender;

    #[test]
    fn test_category_label() {
        assert_eq!(get_category_label(Some("need-based")), "Need-based");
        assert_eq!(get_category_label(Some("full_tuition")), "Full Tuition");
        assert_eq!(get_category_label(Some("phd")), "Phd");
        assert_eq!(get_category_label(None), "N/A");
        assert_eq!(get_category_label(Some("")), "N/A");
    }

    #[test]
    fn test_badge_color_falls_back_to_gray() {
        assert_eq!(get_status_badge_color(Some("unknown-status")), DEFAULT_BADGE);
        assert_eq!(get_status_badge_color(None), DEFAULT_BADGE);
        assert_eq!(get_status_badge_color(Some("active")), "bg-green-100 text-green-800");
    }

    #[test]
    fn test_every_list_starts_with_all() {
        for (entity, field) in [
            ("scholarship", "category"),
            ("scholarship", "level"),
            ("job", "type"),
            ("job", "gender"),
            ("book", "format"),
            ("article", "status"),
            ("user", "role"),
        ] {
            let options = options_for(entity, field).unwrap();
            assert_eq!(options[0], ALL, "{} {}", entity, field);
        }
        assert!(options_for("job", "salary").is_none());
    }

    #[test]
    fn test_job_genders_cover_model() {
        for gender in [Gender::Any, Gender::Male, Gender::Female] {
            assert!(JOB_GENDERS.contains(&gender.as_str()));
        }
    }

    #[test]
    fn test_is_all() {
        assert!(is_all(ALL));
        assert!(is_all(""));
        assert!(!is_all("pdf"));
        assert!(!is_all("all"));
        assert!(PAGE_SIZES.contains(&DEFAULT_PAGE_SIZE));
        assert_eq!(SORT_OPTIONS[0].direction, SortDirection::Desc);
    }
}
