//! Parser for plain-text course documents.
//!
//! Expected layout:
//!
//! ```text
//! Course Title: Intro to Testing
//! Course Link: https://example.com/testing
//! Course Instructor: Ada Lovelace
//!
//! Lesson 1: Unit Tests
//! Lesson Link: https://example.com/testing/1
//! A unit test verifies one behavior in isolation.
//! ```
//!
//! `Title:` and `Instructor:` are accepted without the `Course` prefix. When no
//! title header is present, the first free-standing line becomes the title.

use crate::chunking::LessonText;
use crate::error::{KursdeskError, Result};
use crate::models::{Course, Lesson};
use regex::Regex;
use std::collections::HashSet;
use tracing::warn;

/// A course together with the raw text of each lesson.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedDocument {
    pub course: Course,
    pub sections: Vec<LessonText>,
}

/// Line-oriented course document parser.
pub struct DocumentParser {
    title_regex: Regex,
    link_regex: Regex,
    instructor_regex: Regex,
    lesson_regex: Regex,
    lesson_link_regex: Regex,
}

impl DocumentParser {
    pub fn new() -> Self {
        Self {
            title_regex: Regex::new(r"(?i)^(?:course\s+)?title:\s*(.+)$").expect("Invalid regex"),
            link_regex: Regex::new(r"(?i)^course\s+link:\s*(.+)$").expect("Invalid regex"),
            instructor_regex: Regex::new(r"(?i)^(?:course\s+)?instructor:\s*(.+)$")
                .expect("Invalid regex"),
            lesson_regex: Regex::new(r"(?i)^lesson\s+(\d+)\s*:\s*(.*)$").expect("Invalid regex"),
            lesson_link_regex: Regex::new(r"(?i)^lesson\s+link:\s*(.+)$").expect("Invalid regex"),
        }
    }

    /// Parse raw document text into a course and its lesson bodies.
    pub fn parse(&self, raw: &str) -> Result<ParsedDocument> {
        if raw.trim().is_empty() {
            return Err(KursdeskError::Document("document is empty".to_string()));
        }

        let mut title: Option<String> = None;
        let mut instructor: Option<String> = None;
        let mut course_link: Option<String> = None;
        let mut preamble: Vec<&str> = Vec::new();

        let mut lessons: Vec<Lesson> = Vec::new();
        let mut sections: Vec<LessonText> = Vec::new();
        let mut seen_numbers: HashSet<u32> = HashSet::new();

        // Body lines of the lesson currently being read.
        let mut current: Option<(Lesson, Vec<&str>)> = None;
        let mut expect_lesson_link = false;

        for line in raw.lines() {
            let trimmed = line.trim();

            if let Some(caps) = self.lesson_regex.captures(trimmed) {
                if let Some((lesson, body)) = current.take() {
                    sections.push(finish_section(&lesson, &body));
                    lessons.push(lesson);
                }

                let number: u32 = caps[1].parse().map_err(|_| {
                    KursdeskError::Document(format!("invalid lesson number in '{}'", trimmed))
                })?;
                if !seen_numbers.insert(number) {
                    return Err(KursdeskError::Document(format!(
                        "lesson {} appears more than once",
                        number
                    )));
                }

                let lesson_title = caps[2].trim();
                let lesson_title = if lesson_title.is_empty() {
                    format!("Lesson {}", number)
                } else {
                    lesson_title.to_string()
                };

                current = Some((Lesson::new(number, lesson_title), Vec::new()));
                expect_lesson_link = true;
                continue;
            }

            if let Some((lesson, body)) = current.as_mut() {
                if expect_lesson_link && !trimmed.is_empty() {
                    expect_lesson_link = false;
                    if let Some(caps) = self.lesson_link_regex.captures(trimmed) {
                        lesson.link = validated_link(&caps[1]);
                        continue;
                    }
                }
                body.push(line);
                continue;
            }

            // Still in the header.
            if trimmed.is_empty() {
                preamble.push(line);
                continue;
            }
            if let Some(caps) = self.title_regex.captures(trimmed) {
                title.get_or_insert_with(|| caps[1].trim().to_string());
            } else if let Some(caps) = self.link_regex.captures(trimmed) {
                course_link = validated_link(&caps[1]);
            } else if let Some(caps) = self.instructor_regex.captures(trimmed) {
                instructor = Some(caps[1].trim().to_string());
            } else if title.is_none() {
                title = Some(trimmed.to_string());
            } else {
                preamble.push(line);
            }
        }

        if let Some((lesson, body)) = current.take() {
            sections.push(finish_section(&lesson, &body));
            lessons.push(lesson);
        }

        let title = title
            .filter(|t| !t.is_empty())
            .ok_or_else(|| KursdeskError::Document("missing course title".to_string()))?;

        let preamble = preamble.join("\n").trim().to_string();
        if !preamble.is_empty() {
            sections.insert(
                0,
                LessonText {
                    lesson_number: None,
                    lesson_title: None,
                    body: preamble,
                },
            );
        }

        lessons.sort_by_key(|l| l.number);

        let course = Course {
            title,
            instructor,
            link: course_link,
            lessons,
        };

        Ok(ParsedDocument { course, sections })
    }
}

impl Default for DocumentParser {
    fn default() -> Self {
        Self::new()
    }
}

fn finish_section(lesson: &Lesson, body: &[&str]) -> LessonText {
    LessonText {
        lesson_number: Some(lesson.number),
        lesson_title: Some(lesson.title.clone()),
        body: body.join("\n").trim().to_string(),
    }
}

/// Keep a link only if it parses as an absolute URL.
fn validated_link(raw: &str) -> Option<String> {
    let raw = raw.trim();
    match url::Url::parse(raw) {
        Ok(url) => Some(url.to_string()),
        Err(e) => {
            warn!("Ignoring invalid link '{}': {}", raw, e);
            None
        }
    }
}
