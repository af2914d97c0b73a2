//! The template catalog that ships with the tracker.

use crate::models::task::TaskType::{self, Setup, Standard};

use super::{EventTemplate, TaskStub, WeekTemplate, WeekTemplateEntry};

struct BuiltinEvent {
    id: &'static str,
    name: &'static str,
    location: Option<&'static str>,
    tasks: &'static [(&'static str, TaskType, Option<&'static str>)],
}

struct BuiltinWeek {
    id: &'static str,
    name: &'static str,
    description: &'static str,
    entries: &'static [(&'static str, i32, &'static str)],
}

const EVENT_TEMPLATES: &[BuiltinEvent] = &[
    BuiltinEvent {
        id: "jumuah",
        name: "Jumuah Prayer",
        location: Some("HBKU Mosque"),
        tasks: &[
            ("Send email reminder (Thursday)", Standard, None),
            ("Prepare khutbah slides", Standard, None),
            ("Setup audio equipment", Setup, None),
            ("Arrange prayer rugs", Setup, None),
            ("Photography/Recording", Standard, Some("Media")),
        ],
    },
    BuiltinEvent {
        id: "halaqa",
        name: "Weekly Halaqa",
        location: Some("LAS 2001"),
        tasks: &[
            ("Confirm speaker/topic", Standard, None),
            ("Post social media announcement", Standard, Some("Media")),
            ("Setup chairs & projector", Setup, None),
            ("Prepare refreshments", Standard, None),
        ],
    },
    BuiltinEvent {
        id: "sweet_sunday",
        name: "Sweet Sunday",
        location: Some("UC Black Box"),
        tasks: &[
            ("Order desserts/snacks", Standard, Some("Finance")),
            ("Create event poster", Standard, Some("Media")),
            ("Post on Instagram", Standard, Some("Media")),
            ("Setup tables & decorations", Setup, Some("Logistics")),
            ("Photography", Standard, Some("Media")),
        ],
    },
    BuiltinEvent {
        id: "kk",
        name: "Karak & Konversations (K&K)",
        location: Some("TBD"),
        tasks: &[
            ("Book venue", Standard, Some("Logistics")),
            ("Order karak/snacks", Standard, Some("Finance")),
            ("Prepare discussion topics", Standard, None),
            ("Create event poster", Standard, Some("Media")),
            ("Send email blast", Standard, None),
        ],
    },
    BuiltinEvent {
        id: "speaker_event",
        name: "Speaker Event",
        location: Some("TBD"),
        tasks: &[
            ("Confirm speaker and travel", Standard, None),
            ("Book venue", Standard, Some("Logistics")),
            ("Create event poster", Standard, Some("Media")),
            ("Arrange speaker gift", Standard, Some("Finance")),
            ("Setup stage & microphones", Setup, Some("Logistics")),
            ("Photography & video", Standard, Some("Media")),
        ],
    },
    BuiltinEvent {
        id: "dine_reflect",
        name: "Dine & Reflect",
        location: Some("TBD"),
        tasks: &[
            ("Pick reflection topic", Standard, None),
            ("Order dinner", Standard, Some("Finance")),
            ("Post announcement", Standard, Some("Media")),
            ("Setup seating", Setup, Some("Logistics")),
        ],
    },
    BuiltinEvent {
        id: "email_announcement",
        name: "Weekly Email Announcement",
        location: None,
        tasks: &[
            ("Collect updates from board members", Standard, None),
            ("Draft email content", Standard, None),
            ("Design email graphics", Standard, Some("Media")),
            ("Send via mailing list", Standard, None),
        ],
    },
    BuiltinEvent {
        id: "eid_prep",
        name: "Eid Celebration",
        location: Some("HBKU Student Center"),
        tasks: &[
            ("Book venue", Standard, None),
            ("Plan menu & order food", Standard, None),
            ("Create Eid poster", Standard, Some("Media")),
            ("Send invitations", Standard, None),
            ("Setup decorations", Setup, None),
            ("Arrange seating", Setup, None),
            ("Photography & video", Standard, Some("Media")),
            ("Post event recap", Standard, Some("Media")),
        ],
    },
    BuiltinEvent {
        id: "iftar",
        name: "Community Iftar",
        location: Some("HBKU Mosque"),
        tasks: &[
            ("Order food", Standard, None),
            ("Coordinate volunteers", Standard, None),
            ("Setup food stations", Setup, None),
            ("Prepare dates & water", Setup, None),
            ("Photography", Standard, Some("Media")),
            ("Cleanup coordination", Standard, None),
        ],
    },
    BuiltinEvent {
        id: "custom",
        name: "Custom Event",
        location: None,
        tasks: &[],
    },
];

const WEEK_TEMPLATES: &[BuiltinWeek] = &[
    BuiltinWeek {
        id: "jumuah_halaqa",
        name: "Jumuah + Halaqa",
        description: "A regular week with the weekly halaqa and Friday prayer",
        entries: &[("halaqa", 2, "18:00"), ("jumuah", 4, "12:30")],
    },
    BuiltinWeek {
        id: "sweet_sunday_kk",
        name: "Sweet Sunday + K&K",
        description: "Sweet Sunday to open the week and K&K on Friday",
        entries: &[("sweet_sunday", 0, "19:00"), ("kk", 4, "18:00")],
    },
    BuiltinWeek {
        id: "sweet_sunday_speaker",
        name: "Sweet Sunday + Speaker",
        description: "Sweet Sunday with a guest speaker midweek",
        entries: &[("sweet_sunday", 0, "19:00"), ("speaker_event", 3, "18:30")],
    },
    BuiltinWeek {
        id: "sweet_sunday_dine",
        name: "Sweet Sunday + Dine & Reflect",
        description: "Sweet Sunday with a Dine & Reflect dinner on Friday",
        entries: &[("sweet_sunday", 0, "19:00"), ("dine_reflect", 4, "19:30")],
    },
];

pub fn event_templates() -> Vec<EventTemplate> {
    EVENT_TEMPLATES
        .iter()
        .map(|template| EventTemplate {
            id: template.id.to_owned(),
            name: template.name.to_owned(),
            default_location: template.location.map(str::to_owned),
            tasks: template
                .tasks
                .iter()
                .map(|(title, task_type, team_name)| TaskStub {
                    title: (*title).to_owned(),
                    description: None,
                    task_type: *task_type,
                    team_name: team_name.map(str::to_owned),
                })
                .collect(),
            is_builtin: true,
            is_overridden: false,
        })
        .collect()
}

pub fn is_builtin_event(id: &str) -> bool {
    EVENT_TEMPLATES.iter().any(|template| template.id == id)
}

pub fn week_templates() -> Vec<WeekTemplate> {
    WEEK_TEMPLATES
        .iter()
        .map(|template| WeekTemplate {
            id: template.id.to_owned(),
            name: template.name.to_owned(),
            description: Some(template.description.to_owned()),
            entries: template
                .entries
                .iter()
                .map(|(event_template_id, day_offset, default_time)| WeekTemplateEntry {
                    event_template_id: (*event_template_id).to_owned(),
                    day_offset: *day_offset,
                    default_time: (*default_time).to_owned(),
                })
                .collect(),
            is_builtin: true,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn week_templates_only_reference_builtin_events() {
        for week in week_templates() {
            for entry in &week.entries {
                assert!(
                    is_builtin_event(&entry.event_template_id),
                    "{} references {}",
                    week.id,
                    entry.event_template_id
                );
            }
        }
    }

    #[test]
    fn sweet_sunday_needs_three_teams() {
        let sweet_sunday = event_templates()
            .into_iter()
            .find(|template| template.id == "sweet_sunday")
            .unwrap();

        let mut teams: Vec<_> = sweet_sunday
            .tasks
            .iter()
            .filter_map(|task| task.team_name.as_deref())
            .collect();
        teams.sort_unstable();
        teams.dedup();

        assert_eq!(teams, vec!["Finance", "Logistics", "Media"]);
    }
}
