use rusqlite::{Connection, OptionalExtension};
use std::fs;
use std::path::Path;

use crate::error::Result;
use crate::prediction::{AnalysisResult, AnalyzeStatus};

pub fn ensure_parent_dir(path: &str) -> Result<()> {
    if let Some(parent) = Path::new(path).parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}

pub fn create_tables(conn: &Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS analysis_cache (
            date TEXT PRIMARY KEY,
            status TEXT NOT NULL,
            result_json TEXT,
            updated_at DATETIME DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS prediction_history (
            date TEXT PRIMARY KEY,
            result_json TEXT NOT NULL,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )?;

    Ok(())
}

#[derive(Debug, Clone, PartialEq)]
pub struct CachedAnalysis {
    pub status: AnalyzeStatus,
    pub result: Option<AnalysisResult>,
}

/// Stores the last analysis state shown for a date. `Loading` is never
/// persisted so a restart cannot leave a date stuck mid-analysis.
pub fn save_to_cache(
    conn: &Connection,
    date: &str,
    status: AnalyzeStatus,
    result: Option<&AnalysisResult>,
) -> Result<()> {
    if status == AnalyzeStatus::Loading {
        return Ok(());
    }

    let result_json = result.map(serde_json::to_string).transpose()?;
    conn.execute(
        "INSERT INTO analysis_cache (date, status, result_json, updated_at)
         VALUES (?1, ?2, ?3, CURRENT_TIMESTAMP)
         ON CONFLICT(date) DO UPDATE SET
            status = excluded.status,
            result_json = excluded.result_json,
            updated_at = excluded.updated_at",
        (date, status.as_str(), &result_json),
    )?;
    Ok(())
}

pub fn get_cached_analysis(conn: &Connection, date: &str) -> Result<Option<CachedAnalysis>> {
    let mut stmt = conn.prepare("SELECT status, result_json FROM analysis_cache WHERE date = ?1")?;
    let row = stmt
        .query_row([date], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, Option<String>>(1)?))
        })
        .optional()?;

    let Some((status, result_json)) = row else {
        return Ok(None);
    };

    let status = AnalyzeStatus::parse(&status).unwrap_or(AnalyzeStatus::Idle);
    let result = result_json
        .map(|json| serde_json::from_str::<AnalysisResult>(&json))
        .transpose()?;

    Ok(Some(CachedAnalysis { status, result }))
}

pub fn save_to_history(conn: &Connection, date: &str, result: &AnalysisResult) -> Result<()> {
    let result_json = serde_json::to_string(result)?;
    conn.execute(
        "INSERT INTO prediction_history (date, result_json) VALUES (?1, ?2)
         ON CONFLICT(date) DO UPDATE SET result_json = excluded.result_json",
        (date, &result_json),
    )?;
    Ok(())
}

pub fn get_history_entry(conn: &Connection, date: &str) -> Result<Option<AnalysisResult>> {
    let mut stmt = conn.prepare("SELECT result_json FROM prediction_history WHERE date = ?1")?;
    let json = stmt
        .query_row([date], |row| row.get::<_, String>(0))
        .optional()?;

    Ok(json
        .map(|json| serde_json::from_str::<AnalysisResult>(&json))
        .transpose()?)
}

/// All successful predictions, newest date first.
pub fn get_prediction_history(conn: &Connection) -> Result<Vec<(String, AnalysisResult)>> {
    let mut stmt =
        conn.prepare("SELECT date, result_json FROM prediction_history ORDER BY date DESC")?;
    let rows = stmt.query_map([], |row| {
        Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
    })?;

    let mut history = Vec::new();
    for row in rows {
        let (date, json) = row?;
        history.push((date, serde_json::from_str(&json)?));
    }
    Ok(history)
}

/// State to show for a date: the cache first, then history, else idle.
pub fn restore_analysis(conn: &Connection, date: &str) -> Result<CachedAnalysis> {
    if let Some(cached) = get_cached_analysis(conn, date)? {
        return Ok(cached);
    }

    if let Some(result) = get_history_entry(conn, date)? {
        return Ok(CachedAnalysis {
            status: AnalyzeStatus::Success,
            result: Some(result),
        });
    }

    Ok(CachedAnalysis {
        status: AnalyzeStatus::Idle,
        result: None,
    })
}

/// Caches the outcome of an analysis and keeps successful ones in history.
pub fn record_analysis(conn: &Connection, date: &str, result: &AnalysisResult) -> Result<AnalyzeStatus> {
    let status = result.status();
    save_to_cache(conn, date, status, Some(result))?;
    if status == AnalyzeStatus::Success {
        save_to_history(conn, date, result)?;
    }
    Ok(status)
}

/// Resets a date to idle without touching its history entry.
pub fn clear_analysis(conn: &Connection, date: &str) -> Result<()> {
    save_to_cache(conn, date, AnalyzeStatus::Idle, None)
}
