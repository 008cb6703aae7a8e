//! Read-only data export
//!
//! Projects the current snapshot into a JSON document the user can keep, and
//! into a plain-text progress report. There is no import.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::store::{Achievement, AppState, DocumentStatus, FileType, TaskType};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportUser {
    pub name: Option<String>,
    pub email: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportNotebook {
    pub title: String,
    pub subject: String,
    pub progress: f64,
    pub last_updated: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportDocument {
    pub name: String,
    #[serde(rename = "type")]
    pub file_type: FileType,
    pub pages: u32,
    pub status: DocumentStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportDocumentGroup {
    pub notebook_id: String,
    pub documents: Vec<ExportDocument>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportTask {
    pub title: String,
    #[serde(rename = "type")]
    pub task_type: TaskType,
    pub due_date: NaiveDate,
    pub completed: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportStats {
    pub current_streak: u32,
    pub longest_streak: u32,
    pub total_quizzes: u32,
    /// Minutes
    pub total_study_time: u64,
    pub achievements: Vec<String>,
}

/// Everything written by an export
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportSnapshot {
    pub export_date: DateTime<Utc>,
    pub user: ExportUser,
    pub notebooks: Vec<ExportNotebook>,
    pub documents: Vec<ExportDocumentGroup>,
    pub tasks: Vec<ExportTask>,
    pub stats: ExportStats,
}

impl ExportSnapshot {
    /// Project a state snapshot
    pub fn from_state(state: &AppState, now: DateTime<Utc>) -> Self {
        let user = ExportUser {
            name: state.user.as_ref().map(|u| u.name.clone()),
            email: state.user.as_ref().map(|u| u.email.clone()),
        };

        let notebooks = state
            .notebooks
            .iter()
            .map(|nb| ExportNotebook {
                title: nb.title.clone(),
                subject: nb.subject.clone(),
                progress: nb.progress,
                last_updated: nb.last_updated,
            })
            .collect();

        let documents = state
            .documents
            .iter()
            .map(|(notebook_id, docs)| ExportDocumentGroup {
                notebook_id: notebook_id.clone(),
                documents: docs
                    .iter()
                    .map(|d| ExportDocument {
                        name: d.name.clone(),
                        file_type: d.file_type,
                        pages: d.pages,
                        status: d.status,
                    })
                    .collect(),
            })
            .collect();

        let tasks = state
            .study_tasks
            .iter()
            .map(|t| ExportTask {
                title: t.title.clone(),
                task_type: t.task_type,
                due_date: t.due_date,
                completed: t.completed,
            })
            .collect();

        let stats = &state.user_stats;
        Self {
            export_date: now,
            user,
            notebooks,
            documents,
            tasks,
            stats: ExportStats {
                current_streak: stats.current_streak,
                longest_streak: stats.longest_streak,
                total_quizzes: stats.total_quizzes_completed,
                total_study_time: state.study_metrics.time_spent_minutes,
                achievements: stats.unlocked_achievements.clone(),
            },
        }
    }
}

/// `smart-study-hub-data-YYYY-MM-DD.json`
pub fn export_file_name(date: NaiveDate) -> String {
    format!("smart-study-hub-data-{}.json", date.format("%Y-%m-%d"))
}

/// Write the export into `dir`, returning the file's path
pub fn write_export(state: &AppState, dir: &Path, now: DateTime<Utc>) -> Result<PathBuf> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create export directory {:?}", dir))?;

    let snapshot = ExportSnapshot::from_state(state, now);
    let path = dir.join(export_file_name(now.date_naive()));
    let contents =
        serde_json::to_string_pretty(&snapshot).with_context(|| "Failed to serialize export")?;
    std::fs::write(&path, contents)
        .with_context(|| format!("Failed to write export to {:?}", path))?;

    tracing::info!(path = %path.display(), "Data exported");
    Ok(path)
}

fn percent(ratio: f64) -> u32 {
    (ratio.clamp(0.0, 1.0) * 100.0).round() as u32
}

/// Human-readable progress report
pub fn progress_report(state: &AppState, date: NaiveDate) -> String {
    let stats = &state.user_stats;
    let total_tasks = state.study_tasks.len();
    let completed_tasks = state.completed_task_count();
    let tasks_ratio =
        if total_tasks == 0 { 0.0 } else { completed_tasks as f64 / total_tasks as f64 };
    let rule = "-".repeat(30);

    let mut out = String::new();
    out.push_str("SMART STUDY HUB - PROGRESS REPORT\n");
    out.push_str(&"=".repeat(50));
    out.push_str(&format!("\nExport Date: {}\n\n", date.format("%Y-%m-%d")));

    out.push_str(&format!("STATISTICS\n{}\n", rule));
    out.push_str(&format!("Notebooks: {}\n", state.notebooks.len()));
    out.push_str(&format!("Documents: {}\n", state.total_documents()));
    out.push_str(&format!("Tasks: {}/{}\n", completed_tasks, total_tasks));
    out.push_str(&format!("Current Streak: {} days\n", stats.current_streak));
    out.push_str(&format!("Longest Streak: {} days\n\n", stats.longest_streak));

    out.push_str(&format!("PROGRESS\n{}\n", rule));
    out.push_str(&format!("Coverage: {}%\n", percent(state.study_metrics.overall_coverage)));
    out.push_str(&format!("Accuracy: {}%\n", percent(state.study_metrics.average_quiz_accuracy)));
    out.push_str(&format!("Tasks Progress: {}%\n\n", percent(tasks_ratio)));

    out.push_str(&format!("SKILLS\n{}\n", rule));
    for skill in &stats.skill_levels {
        out.push_str(&format!("{}: {}%\n", skill.skill, skill.level));
    }

    out.push_str(&format!("\nACHIEVEMENTS UNLOCKED\n{}\n", rule));
    for achievement in stats.unlocked_achievements.iter().filter_map(|id| Achievement::from_id(id)) {
        out.push_str(&format!("+ {}\n", achievement.title()));
    }

    out.push_str(&format!("\nMONTHLY GOALS\n{}\n", rule));
    for goal in &stats.monthly_goals {
        out.push_str(&format!("{}: {}/{}\n", goal.goal, goal.current, goal.target));
    }

    out
}

/// Achievements still locked
pub fn locked_achievements(state: &AppState) -> Vec<Achievement> {
    let inputs = state.achievement_inputs();
    Achievement::ALL
        .iter()
        .copied()
        .filter(|a| !state.user_stats.unlocked_achievements.iter().any(|id| id == a.id()))
        .filter(|a| !a.is_met(&inputs))
        .collect()
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use pretty_assertions::assert_eq;
    use tempfile::tempdir;

    use super::*;
    use crate::store::{Document, ManualClock, Store};

    fn populated_store() -> Store {
        let date = NaiveDate::from_ymd_opt(2024, 5, 1).unwrap();
        let mut store = Store::new(Arc::new(ManualClock::at_date(date)));
        assert!(store.login("jane.doe@uni.edu", "pw"));
        let nb = store.create_notebook("Algorithms", "Computer Science", None);
        store.add_document(
            &nb.id,
            Document {
                id: "doc1".into(),
                name: "lecture1.pdf".into(),
                file_type: FileType::Pdf,
                pages: 12,
                status: DocumentStatus::Indexed,
                content: Some("text".into()),
                url: None,
            },
        );
        store
    }

    #[test]
    fn snapshot_projects_state() {
        let store = populated_store();
        let snapshot = ExportSnapshot::from_state(store.state(), store.now());

        assert_eq!(snapshot.user.name.as_deref(), Some("Jane Doe"));
        assert_eq!(snapshot.notebooks.len(), 1);
        assert_eq!(snapshot.notebooks[0].title, "Algorithms");
        assert_eq!(snapshot.documents.len(), 1);
        assert_eq!(
            snapshot.documents[0].documents,
            vec![ExportDocument {
                name: "lecture1.pdf".into(),
                file_type: FileType::Pdf,
                pages: 12,
                status: DocumentStatus::Indexed,
            }]
        );
        assert_eq!(snapshot.tasks.len(), 1);
        assert_eq!(snapshot.tasks[0].title, "Study: Algorithms");
        assert_eq!(snapshot.stats.current_streak, 1);
    }

    #[test]
    fn export_json_uses_camel_case() {
        let store = populated_store();
        let json = serde_json::to_value(ExportSnapshot::from_state(store.state(), store.now()))
            .unwrap();
        assert!(json.get("exportDate").is_some());
        assert!(json["notebooks"][0].get("lastUpdated").is_some());
        assert_eq!(json["documents"][0]["documents"][0]["type"], "pdf");
        assert_eq!(json["tasks"][0]["type"], "read");
        assert!(json["tasks"][0].get("dueDate").is_some());
        assert!(json["stats"].get("totalStudyTime").is_some());
    }

    #[test]
    fn file_name_has_date() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 9).unwrap();
        assert_eq!(export_file_name(date), "smart-study-hub-data-2024-03-09.json");
    }

    #[test]
    fn write_export_creates_file() {
        let dir = tempdir().unwrap();
        let store = populated_store();
        let path = write_export(store.state(), &dir.path().join("out"), store.now()).unwrap();

        assert!(path.ends_with("smart-study-hub-data-2024-05-01.json"));
        let written: ExportSnapshot =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(written, ExportSnapshot::from_state(store.state(), store.now()));
    }

    #[test]
    fn report_lists_sections() {
        let store = populated_store();
        let report = progress_report(store.state(), store.today());
        assert!(report.starts_with("SMART STUDY HUB - PROGRESS REPORT"));
        assert!(report.contains("Notebooks: 1\n"));
        assert!(report.contains("Documents: 1\n"));
        assert!(report.contains("Tasks: 0/1\n"));
        assert!(report.contains("Computer Science: 5%\n"));
        assert!(report.contains("Complete 20 quizzes: 0/20\n"));
    }

    #[test]
    fn nothing_is_locked_twice() {
        let store = populated_store();
        let locked = locked_achievements(store.state());
        assert!(locked.iter().all(|a| {
            !store.state().user_stats.unlocked_achievements.iter().any(|id| id == a.id())
        }));
        assert!(locked.contains(&Achievement::TaskMaster));
        assert!(!locked.contains(&Achievement::DailyLearner));
    }
}
