//! Maps free-text job titles onto the closed set of decision-maker roles.

use crate::core::models::Role;

/// Tie-break rank for a title that matched no keyword group.
pub const UNMATCHED_PRIORITY: u8 = 9;

/// Keyword groups, checked in order. The first group with a matching keyword wins,
/// so "Operations Manager" lands on operations before the generic manager group.
const ROLE_KEYWORDS: &[(Role, &[&str])] = &[
    (
        Role::Owner,
        &["owner", "founder", "ceo", "chief executive", "president", "principal"],
    ),
    (
        Role::MedicalDirector,
        &["medical director", "chief medical", "physician", "doctor"],
    ),
    (
        Role::PracticeAdministrator,
        &["administrator", "practice admin"],
    ),
    (Role::MarketingDirector, &["marketing"]),
    (Role::OperationsManager, &["operations", "ops"]),
    (Role::ClinicManager, &["manager"]),
];

/// Returns the role whose keywords match `title`, or `None` when nothing matches.
pub fn classify_title(title: &str) -> Option<Role> {
    let lower = title.to_lowercase();
    ROLE_KEYWORDS
        .iter()
        .find(|(_, keywords)| keywords.iter().any(|k| lower.contains(k)))
        .map(|(role, _)| *role)
}

/// Role for a title, defaulting to clinic manager when nothing matches.
pub fn role_for_title(title: &str) -> Role {
    classify_title(title).unwrap_or(Role::ClinicManager)
}

/// Tie-break priority for a title: the matched role's priority, or
/// [`UNMATCHED_PRIORITY`] when the title matched nothing.
pub fn title_priority(title: &str) -> u8 {
    classify_title(title)
        .map(Role::priority)
        .unwrap_or(UNMATCHED_PRIORITY)
}

/// Score used to rank employees returned by the email-finder provider.
/// Higher is better; zero means the title does not read as a decision maker.
pub fn decision_maker_score(title: &str) -> u8 {
    let lower = title.to_lowercase();
    const SCORED: &[(&str, u8)] = &[
        ("owner", 100),
        ("founder", 100),
        ("ceo", 95),
        ("chief executive", 95),
        ("president", 90),
        ("principal", 85),
        ("partner", 80),
        ("medical director", 80),
        ("chief", 75),
        ("director", 70),
        ("administrator", 65),
        ("manager", 60),
        ("head of", 55),
        ("physician", 50),
        ("doctor", 50),
        ("lead", 40),
    ];
    SCORED
        .iter()
        .filter(|(keyword, _)| lower.contains(keyword))
        .map(|(_, score)| *score)
        .max()
        .unwrap_or(0)
}
