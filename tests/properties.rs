use std::collections::HashMap;
use std::io::{Cursor, Write};

use listen_rank::{
    ARTIST_COLUMN, BuildOptions, CountError, CountIndex, Discipline, MalformedRowPolicy,
    ReaderSource, Session, TRACK_COLUMN, TextSource, build, build_into, build_sharded, enumerate_all,
    rank, rank_top,
};

const HEADER: &str = "ts\tmaster_metadata_track_name\tmaster_metadata_album_artist_name\tms_played";

fn history(plays: &[(&str, &str)]) -> String {
    let mut body = String::from(HEADER);
    for (i, (track, artist)) in plays.iter().enumerate() {
        body.push_str(&format!("\n2024-01-{:02}\t{track}\t{artist}\t{}", i % 28 + 1, 1000 + i));
    }
    body.push('\n');
    body
}

fn plays() -> Vec<(&'static str, &'static str)> {
    vec![
        ("Teardrop", "Massive Attack"),
        ("Angel", "Massive Attack"),
        ("Teardrop", "Massive Attack"),
        ("Roads", "Portishead"),
        ("Glory Box", "Portishead"),
        ("Teardrop", "Massive Attack"),
        ("Roads", "Portishead"),
        ("Unfinished Sympathy", "Massive Attack"),
        ("teardrop", "Massive Attack"),
        ("Roads ", "Portishead"),
    ]
}

fn build_from(body: &str, field: &str, discipline: Discipline) -> CountIndex {
    build(
        TextSource::from_text("history", body),
        field,
        discipline,
        &BuildOptions::default(),
    )
    .unwrap()
    .0
}

fn mapping(index: &CountIndex) -> HashMap<String, u64> {
    index.iter().map(|(k, c)| (k.to_string(), c)).collect()
}

#[test]
fn worked_example() {
    let body = "master_metadata_track_name\tother_col\nSong A\tx\nSong B\ty\nSong A\tz\n";
    let index = build_from(body, TRACK_COLUMN, Discipline::Ordered);
    let ranking = rank(&index);
    let pairs: Vec<_> = ranking
        .entries()
        .iter()
        .map(|e| (e.key.as_str(), e.count))
        .collect();
    assert_eq!(pairs, vec![("Song A", 2), ("Song B", 1)]);
    assert_eq!(ranking.top_n(1).len(), 1);
    assert_eq!(ranking.top_n(1)[0].key, "Song A");
    assert_eq!(index.get("Song B"), 1);
    assert_eq!(index.get("Song C"), 0);
}

#[test]
fn counts_sum_to_valid_rows() {
    let body = history(&plays());
    for discipline in [Discipline::Unordered, Discipline::Ordered] {
        let index = build_from(&body, TRACK_COLUMN, discipline);
        assert_eq!(index.total(), plays().len() as u64);
    }
}

#[test]
fn disciplines_hold_identical_mappings() {
    let body = history(&plays());
    for field in [TRACK_COLUMN, ARTIST_COLUMN] {
        let unordered = build_from(&body, field, Discipline::Unordered);
        let ordered = build_from(&body, field, Discipline::Ordered);
        assert_eq!(mapping(&unordered), mapping(&ordered));
        assert_eq!(rank(&unordered), rank(&ordered));
    }
}

#[test]
fn ordered_enumeration_is_strictly_increasing() {
    let index = build_from(&history(&plays()), TRACK_COLUMN, Discipline::Ordered);
    let keys: Vec<_> = enumerate_all(&index).into_iter().map(|e| e.key).collect();
    assert!(keys.windows(2).all(|pair| pair[0] < pair[1]));
    assert_eq!(keys.len(), index.len());
}

#[test]
fn ranking_is_non_increasing() {
    let index = build_from(&history(&plays()), TRACK_COLUMN, Discipline::Unordered);
    let ranking = rank(&index);
    assert!(
        ranking
            .entries()
            .windows(2)
            .all(|pair| pair[0].count >= pair[1].count)
    );
    assert_eq!(ranking.entries()[0].key, "Teardrop");
    assert_eq!(ranking.entries()[0].count, 3);
}

#[test]
fn top_n_is_a_bounded_prefix() {
    let index = build_from(&history(&plays()), TRACK_COLUMN, Discipline::Ordered);
    let ranking = rank(&index);
    for n in [0, 1, 3, ranking.len(), ranking.len() + 5] {
        let top = ranking.top_n(n);
        assert_eq!(top.len(), n.min(ranking.len()));
        assert_eq!(top, &ranking.entries()[..top.len()]);
        assert_eq!(rank_top(&index, n).entries(), top);
    }
}

#[test]
fn lookup_is_sound_and_read_only() {
    let body = history(&plays());
    let index = build_from(&body, ARTIST_COLUMN, Discipline::Unordered);
    let before = index.clone();
    assert_eq!(index.get("Massive Attack"), 6);
    assert_eq!(index.get("Portishead"), 4);
    for _ in 0..3 {
        assert_eq!(index.get("Tricky"), 0);
        assert_eq!(index.get("massive attack"), 0);
        let _ = enumerate_all(&index);
    }
    assert_eq!(index, before);
}

#[test]
fn keys_keep_case_and_whitespace() {
    let index = build_from(&history(&plays()), TRACK_COLUMN, Discipline::Ordered);
    assert_eq!(index.get("Teardrop"), 3);
    assert_eq!(index.get("teardrop"), 1);
    assert_eq!(index.get("Roads"), 2);
    assert_eq!(index.get("Roads "), 1);
}

#[test]
fn second_build_is_refused_and_harmless() {
    let body = history(&plays());
    let mut index = CountIndex::new(Discipline::Ordered);
    build_into(
        &mut index,
        TextSource::from_text("h", body.as_str()),
        TRACK_COLUMN,
        &BuildOptions::default(),
    )
    .unwrap();
    let before = index.clone();

    let err = build_into(
        &mut index,
        TextSource::from_text("h", body.as_str()),
        TRACK_COLUMN,
        &BuildOptions::default(),
    )
    .unwrap_err();
    assert!(matches!(err, CountError::AlreadyBuilt { .. }));
    assert_eq!(index, before);
}

#[test]
fn sharded_build_matches_concatenation() {
    let all = plays();
    let (first, second) = all.split_at(4);
    let shards = vec![
        TextSource::from_text("a", history(first)),
        TextSource::from_text("b", history(second)),
    ];
    let (sharded, stats) =
        build_sharded(shards, TRACK_COLUMN, Discipline::Unordered, &BuildOptions::default()).unwrap();
    let whole = build_from(&history(&all), TRACK_COLUMN, Discipline::Unordered);
    assert_eq!(mapping(&sharded), mapping(&whole));
    assert_eq!(stats.counted, all.len());
}

#[test]
fn utf16_file_matches_utf8_text() {
    let body = history(&[("Hyperballad", "Björk"), ("Jóga", "Björk")]);
    let mut bytes = vec![0xFE, 0xFF];
    for unit in body.encode_utf16() {
        bytes.extend_from_slice(&unit.to_be_bytes());
    }
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(&bytes).unwrap();

    let (from_file, _) = build(
        TextSource::open(file.path()).unwrap(),
        ARTIST_COLUMN,
        Discipline::Ordered,
        &BuildOptions::default(),
    )
    .unwrap();
    assert_eq!(from_file, build_from(&body, ARTIST_COLUMN, Discipline::Ordered));
    assert_eq!(from_file.get("Björk"), 2);
}

#[test]
fn reader_source_handles_crlf_and_strict_rows() {
    let body = "master_metadata_track_name\tx\r\nOne\t1\r\nTwo\r\n";
    let (index, stats) = build(
        ReaderSource::new("stdin", Cursor::new(body)),
        TRACK_COLUMN,
        Discipline::Unordered,
        &BuildOptions::default(),
    )
    .unwrap();
    assert_eq!(index.get("One"), 1);
    assert_eq!(index.get("Two"), 1);
    assert_eq!(stats.skipped, 0);

    let options = BuildOptions {
        on_malformed: MalformedRowPolicy::Abort,
        ..BuildOptions::default()
    };
    let err = build(
        ReaderSource::new("stdin", Cursor::new("x\ty\n1\n")),
        "y",
        Discipline::Unordered,
        &options,
    )
    .unwrap_err();
    assert!(matches!(err, CountError::MalformedRow { line: 2, found: 1, position: 1, .. }));
}

#[test]
fn reader_source_resolves_header_after_bom() {
    let (index, _) = build(
        ReaderSource::new("stdin", Cursor::new("\u{FEFF}name\nA\nA\n")),
        "name",
        Discipline::Ordered,
        &BuildOptions::default(),
    )
    .unwrap();
    assert_eq!(index.get("A"), 2);
}

#[test]
fn built_index_holds_only_positive_counts() {
    let index = build_from(&history(&plays()), TRACK_COLUMN, Discipline::Ordered);
    assert!(index.iter().all(|(key, count)| count >= 1 && index.get(key) == count));
    assert_eq!(index.get("ghost"), 0);
    assert!(!index.contains("ghost"));
}

#[test]
fn session_keeps_one_index_per_slot() {
    let body = history(&plays());
    let mut session = Session::new();
    let options = BuildOptions::default();
    session
        .build(ARTIST_COLUMN, Discipline::Ordered, TextSource::from_text("h", body.as_str()), &options)
        .unwrap();
    session
        .build_sharded(
            TRACK_COLUMN,
            Discipline::Unordered,
            vec![TextSource::from_text("h", body.as_str())],
            &options,
        )
        .unwrap();

    assert!(matches!(
        session.lookup(TRACK_COLUMN, Discipline::Ordered, "Teardrop"),
        Err(CountError::NotBuilt { .. })
    ));
    assert_eq!(session.lookup(TRACK_COLUMN, Discipline::Unordered, "Teardrop").unwrap(), 3);
    let top = session.rank(ARTIST_COLUMN, Discipline::Ordered).unwrap();
    assert_eq!(top.top_n(1)[0].to_string(), "Massive Attack: 6");

    let err = session
        .build_sharded(
            ARTIST_COLUMN,
            Discipline::Ordered,
            vec![TextSource::from_text("h", body.as_str())],
            &options,
        )
        .unwrap_err();
    assert!(matches!(err, CountError::AlreadyBuilt { discipline: Discipline::Ordered, .. }));
}
