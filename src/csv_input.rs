//! CSV job loading: every `*.csv` file in the input directory becomes one
//! playlist job, named after the file stem.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};

use crate::config::CsvConfig;
use crate::models::{PlaylistJob, TrackQuery};

/// Load one job per CSV file in `dir`, sorted by file name so runs are
/// reproducible. A directory with no CSV files is an error; an individual
/// file that cannot be parsed fails the whole load rather than silently
/// dropping a playlist.
pub fn load_jobs(dir: &Path, csv: &CsvConfig) -> Result<Vec<PlaylistJob>> {
    let mut paths: Vec<PathBuf> = fs::read_dir(dir)
        .with_context(|| format!("cannot read input directory {}", dir.display()))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| {
            p.extension()
                .map(|ext| ext.eq_ignore_ascii_case("csv"))
                .unwrap_or(false)
        })
        .collect();
    paths.sort();

    if paths.is_empty() {
        bail!("no .csv files found in {}", dir.display());
    }

    paths.iter().map(|path| load_job(path, csv)).collect()
}

/// Parse a single CSV file into a job. Rows with an empty title are
/// malformed for our purposes; they are logged and skipped rather than
/// poisoning the playlist.
pub fn load_job(path: &Path, csv: &CsvConfig) -> Result<PlaylistJob> {
    let playlist_name = path
        .file_stem()
        .and_then(|s| s.to_str())
        .map(str::to_string)
        .with_context(|| format!("cannot derive playlist name from {}", path.display()))?;

    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_path(path)
        .with_context(|| format!("cannot open {}", path.display()))?;

    let headers = reader
        .headers()
        .with_context(|| format!("cannot read header row of {}", path.display()))?
        .clone();
    let title_idx = column_index(&headers, &csv.title_column)
        .with_context(|| format!("{}: missing column '{}'", path.display(), csv.title_column))?;
    let artist_idx = column_index(&headers, &csv.artist_column);
    let album_idx = csv
        .album_column
        .as_deref()
        .and_then(|name| column_index(&headers, name));

    let mut queries = Vec::new();
    for (row, record) in reader.records().enumerate() {
        let record =
            record.with_context(|| format!("{}: malformed row {}", path.display(), row + 2))?;

        let title = record.get(title_idx).unwrap_or("").trim();
        if title.is_empty() {
            log::warn!(
                "{}: row {} has an empty title, skipping",
                path.display(),
                row + 2
            );
            continue;
        }

        let artist = artist_idx
            .and_then(|i| record.get(i))
            .unwrap_or("")
            .trim()
            .to_string();
        let album = album_idx
            .and_then(|i| record.get(i))
            .map(str::trim)
            .filter(|a| !a.is_empty())
            .map(str::to_string);

        queries.push(TrackQuery {
            title: title.to_string(),
            artist,
            album,
        });
    }

    Ok(PlaylistJob {
        playlist_name,
        queries,
    })
}

fn column_index(headers: &csv::StringRecord, name: &str) -> Option<usize> {
    headers
        .iter()
        .position(|h| h.trim().eq_ignore_ascii_case(name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write as _;

    fn write_csv(dir: &Path, name: &str, body: &str) -> PathBuf {
        let path = dir.join(name);
        let mut f = fs::File::create(&path).unwrap();
        f.write_all(body.as_bytes()).unwrap();
        path
    }

    fn default_csv_config() -> CsvConfig {
        CsvConfig::default()
    }

    #[test]
    fn job_name_comes_from_file_stem() {
        let dir = tempdir();
        let path = write_csv(&dir, "Road Trip.csv", "title,artist\nYesterday,The Beatles\n");
        let job = load_job(&path, &default_csv_config()).unwrap();
        assert_eq!(job.playlist_name, "Road Trip");
        assert_eq!(job.queries.len(), 1);
        assert_eq!(job.queries[0].artist, "The Beatles");
        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn empty_title_rows_are_skipped() {
        let dir = tempdir();
        let path = write_csv(
            &dir,
            "mix.csv",
            "title,artist\nYesterday,The Beatles\n,Queen\nLet It Be,The Beatles\n",
        );
        let job = load_job(&path, &default_csv_config()).unwrap();
        assert_eq!(job.queries.len(), 2);
        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn headers_match_case_insensitively() {
        let dir = tempdir();
        let path = write_csv(&dir, "mix.csv", "Title,Artist\nYesterday,The Beatles\n");
        let job = load_job(&path, &default_csv_config()).unwrap();
        assert_eq!(job.queries.len(), 1);
        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn missing_artist_column_yields_empty_artists() {
        let dir = tempdir();
        let path = write_csv(&dir, "mix.csv", "title\nYesterday\n");
        let job = load_job(&path, &default_csv_config()).unwrap();
        assert_eq!(job.queries[0].artist, "");
        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn album_column_is_optional_per_row() {
        let dir = tempdir();
        let mut cfg = default_csv_config();
        cfg.album_column = Some("album".to_string());
        let path = write_csv(
            &dir,
            "mix.csv",
            "title,artist,album\nYesterday,The Beatles,Help!\nLet It Be,The Beatles,\n",
        );
        let job = load_job(&path, &cfg).unwrap();
        assert_eq!(job.queries[0].album.as_deref(), Some("Help!"));
        assert!(job.queries[1].album.is_none());
        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn jobs_load_in_name_order() {
        let dir = tempdir();
        write_csv(&dir, "b.csv", "title\nOne\n");
        write_csv(&dir, "a.csv", "title\nTwo\n");
        write_csv(&dir, "notes.txt", "not a csv\n");
        let jobs = load_jobs(&dir, &default_csv_config()).unwrap();
        assert_eq!(jobs.len(), 2);
        assert_eq!(jobs[0].playlist_name, "a");
        assert_eq!(jobs[1].playlist_name, "b");
        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn empty_directory_is_an_error() {
        let dir = tempdir();
        assert!(load_jobs(&dir, &default_csv_config()).is_err());
        fs::remove_dir_all(&dir).unwrap();
    }

    fn tempdir() -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "plexmend-csv-test-{}-{:?}",
            std::process::id(),
            std::thread::current().id()
        ));
        fs::create_dir_all(&dir).unwrap();
        for entry in fs::read_dir(&dir).unwrap().flatten() {
            let _ = fs::remove_file(entry.path());
        }
        dir
    }
}
