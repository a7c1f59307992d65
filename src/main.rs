use std::io::Read;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use encore::anniversary::{self, AnniversaryHit, AnniversaryQueue, GreetingLog};
use encore::app::{AppState, MessageOutcome};
use encore::attendance::{self, AttendanceStore, HostShell};
use encore::cache::Cache;
use encore::config::AppConfig;
use encore::loader::{LoadMode, Loader, Source};
use encore::messaging::{InboundMessage, OutboundMessage};
use encore::models::{SongCatalog, SongType, TourCategory};
use encore::search::LiveFilter;
use encore::setlist::display::{LineNumber, copy_text, numbered_lines};
use encore::stats::composition::{Composition, setlist_composition};
use encore::stats::ranking::{RankedEntry, SongSort, SortKey, SortOrder, pattern_ranking, song_ranking};
use encore::stats::timeline::{PlaceSelection, category_summary, place_timeline, song_timeline};
use encore::stats::venues::{PlaceTables, unvisited_prefectures};
use encore::stats::PatternKind;
use indicatif::{ProgressBar, ProgressStyle};

#[derive(Parser)]
#[command(name = "encore", version, about = "Live setlist archive and statistics")]
struct Cli {
    /// Path to the SQLite cache
    #[arg(long, global = true)]
    db_path: Option<PathBuf>,

    /// Data endpoint (overrides config)
    #[arg(long, global = true)]
    endpoint: Option<String>,

    /// Never touch the network; use cached data only
    #[arg(long, global = true)]
    offline: bool,

    /// Verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum TourArg {
    Pop,
    Rock,
    Aloha,
    Other,
}

impl From<TourArg> for TourCategory {
    fn from(t: TourArg) -> Self {
        match t {
            TourArg::Pop => Self::Pop,
            TourArg::Rock => Self::Rock,
            TourArg::Aloha => Self::Aloha,
            TourArg::Other => Self::Other,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum SortArg {
    Count,
    Year,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch the latest data and replace the cache
    Refresh {
        /// Drop every cached entry first
        #[arg(long)]
        reset: bool,
    },

    /// List shows, newest first
    Shows {
        /// Free text: tour, date, venue or region
        text: Option<String>,
        #[arg(long, value_enum)]
        tour: Option<TourArg>,
        #[arg(long)]
        year: Option<i32>,
        #[arg(long)]
        region: Option<String>,
        /// Only shows featuring this song
        #[arg(long)]
        song: Option<String>,
        /// Ignore medley appearances for --song
        #[arg(long)]
        no_medley: bool,
        /// Only shows you attended
        #[arg(long)]
        attended: bool,
    },

    /// Show one setlist
    Show {
        /// Show date as stored, e.g. 2024/03/15
        date: String,
        /// Print only the plain-text setlist
        #[arg(long)]
        copy: bool,
    },

    /// Song ranking
    Songs {
        /// Name prefix
        #[arg(long, default_value = "")]
        search: String,
        #[arg(long, value_enum, default_value = "count")]
        sort: SortArg,
        /// Ascending instead of descending
        #[arg(long)]
        asc: bool,
        #[arg(long)]
        no_medley: bool,
        #[arg(short = 'n', long, default_value = "50")]
        limit: usize,
    },

    /// Statistics for one song
    Song {
        name: String,
        #[arg(long)]
        no_medley: bool,
    },

    /// Play counts per album
    Albums,

    /// Opening, encore and closing songs
    Patterns {
        #[arg(short = 'n', long, default_value = "10")]
        limit: usize,
    },

    /// Venue ranking
    Venues {
        #[arg(default_value = "")]
        search: String,
        /// Per-year chart for one venue key
        #[arg(long)]
        select: Option<String>,
        #[arg(short = 'n', long, default_value = "30")]
        limit: usize,
    },

    /// Region ranking
    Regions {
        #[arg(default_value = "")]
        search: String,
        #[arg(long)]
        select: Option<String>,
        /// List prefectures never played
        #[arg(long)]
        unvisited: bool,
    },

    /// Anniversaries falling on today
    Today {
        /// Show even if already greeted today
        #[arg(long)]
        force: bool,
    },

    /// Mark a show attended (or not)
    Attend {
        date: String,
        #[arg(long)]
        off: bool,
    },

    /// Save a memo for an attended show
    Memo { date: String, text: String },

    /// Your attendance statistics
    Mine {
        /// Focus on one song
        #[arg(long)]
        song: Option<String>,
        /// Filter your song ranking (substring)
        #[arg(long, default_value = "")]
        search: String,
        #[arg(long)]
        no_medley: bool,
        #[arg(short = 'n', long, default_value = "30")]
        limit: usize,
    },

    /// Month-by-month career timeline
    History {
        /// Include months with nothing in them
        #[arg(long)]
        all: bool,
    },

    /// Apply a host message (JSON, or "-" for stdin)
    Message { json: String },
}

/// Host channel of the CLI: outbound messages go to stdout as JSON lines.
struct StdoutHost;

impl HostShell for StdoutHost {
    fn notify(&mut self, message: OutboundMessage) {
        match message.to_json() {
            Ok(json) => println!("{json}"),
            Err(e) => log::error!("could not encode {message:?}: {e}"),
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level))
        .format_timestamp(None)
        .init();

    let config = AppConfig::load();
    let offset = anniversary::offset_from_hours(config.calendar.utc_offset_hours);
    let endpoint = cli.endpoint.clone().unwrap_or_else(|| config.endpoint.clone());

    // Resolve cache path: CLI > config > XDG default
    let db_path = cli.db_path.clone().unwrap_or_else(|| config.resolve_db_path());
    log::info!("Cache: {}", db_path.display());
    let mut cache = Cache::open(&db_path, config.cache.max_bytes).context("Failed to open cache")?;
    cache.ensure_version(encore::VERSION).context("Failed to check cache version")?;

    let mut app = AppState::new(offset);
    app.user = cache.load_user_data().context("Failed to read user data")?;
    let loader = Loader::new(Some(&cache), &config.cache.key);

    let mode = match (&cli.command, cli.offline) {
        (_, true) => LoadMode::CacheOnly,
        (Commands::Refresh { .. }, false) => LoadMode::NetworkOnly,
        _ => LoadMode::CacheFirst,
    };
    if let Commands::Refresh { reset: true } = cli.command {
        cache.clear().context("Failed to clear cache")?;
        cache.ensure_version(encore::VERSION)?;
        cache.save_user_data(&app.user)?;
    }

    // attend/memo/message don't need show data up front
    let needs_data = !matches!(
        cli.command,
        Commands::Attend { .. } | Commands::Memo { .. } | Commands::Message { .. }
    );
    if needs_data {
        let spinner = fetch_spinner(mode);
        let result = loader.load(mode, &endpoint);
        spinner.finish_and_clear();
        match result {
            Ok((payload, source)) => {
                if source == Source::Network {
                    log::info!("Fetched {} shows", payload.live_records.len());
                }
                app.install(payload);
            }
            Err(e) => {
                app.load(Err(e));
                anyhow::bail!("No data available: {}", app.error().unwrap_or("unknown error"));
            }
        }
    }

    match cli.command {
        Commands::Refresh { .. } => {
            let snapshot = app.snapshot().context("No data loaded")?;
            println!(
                "Refreshed: {} shows, {} songs, last update {}",
                snapshot.records().len(),
                snapshot.song_stats.song_count(),
                snapshot.payload.last_update_label(offset).unwrap_or_else(|| "-".into())
            );
        }

        Commands::Shows { text, tour, year, region, song, no_medley, attended } => {
            app.filter = LiveFilter {
                text: text.unwrap_or_default(),
                tour: tour.map(TourCategory::from),
                year,
                region,
                song,
                include_medley: !no_medley,
                attended_only: attended,
            };
            let shows = app.visible_records();
            println!("{} / {} shows", shows.len(), app.records().len());
            println!();
            for rec in shows {
                let mark = if app.user.attended_lives.contains_key(&rec.date) { "*" } else { " " };
                println!(
                    "{mark} {:<12} {:<6} {:<40} {} ({})",
                    rec.date,
                    rec.series().label(),
                    truncate(&rec.tour_name, 40),
                    rec.venue,
                    rec.region
                );
            }
        }

        Commands::Show { date, copy } => {
            let snapshot = app.snapshot().context("No data loaded")?;
            let Some(rec) = snapshot.records().iter().find(|r| r.date == date) else {
                println!("No show on {date}.");
                return Ok(());
            };
            if copy {
                print!("{}", copy_text(&rec.setlist));
                return Ok(());
            }
            println!("{} ({})  [{}]", rec.date, rec.day_of_week, rec.series().label());
            println!("{}", rec.tour_name);
            println!("{} ({})", rec.venue, rec.region);
            println!();
            for line in numbered_lines(&rec.setlist) {
                if let Some(wave) = line.encore_header {
                    println!("  -- encore {wave} --");
                }
                match line.number {
                    LineNumber::Main(n) => println!("{n:>3}. {}", line.title),
                    LineNumber::Medley(n) => println!("       ({n}) {}", line.title),
                }
            }

            let composition = setlist_composition(&rec.setlist, &snapshot.payload.song_data);
            if !composition.type_counts.is_empty() {
                println!();
                let parts: Vec<String> = [SongType::Title, SongType::Coupling, SongType::Album, SongType::Other]
                    .iter()
                    .map(|t| format!("{} {}", t.label(), composition.count(*t)))
                    .collect();
                println!("{}", parts.join("  "));
                print_composition_grid(&composition, &snapshot.payload.song_data);
            }
            if let Some(entry) = app.user.attended_lives.get(&rec.date) {
                println!();
                println!("Attended.{}", if entry.memo.is_empty() { String::new() } else { format!(" Memo: {}", entry.memo) });
            }
            if let Some(ref tweet) = rec.after_live_tweet {
                println!("{tweet}");
            }
        }

        Commands::Songs { search, sort, asc, no_medley, limit } => {
            let snapshot = app.snapshot().context("No data loaded")?;
            let key = match sort {
                SortArg::Count => SortKey::Count,
                SortArg::Year => SortKey::Year,
            };
            let order = if asc { SortOrder::Asc } else { SortOrder::Desc };
            let ranked = song_ranking(&snapshot.song_stats, !no_medley, &search, SongSort::new(key, order));
            println!("{} songs", ranked.len());
            println!();
            print_ranking(&ranked[..ranked.len().min(limit)]);
        }

        Commands::Song { name, no_medley } => {
            let snapshot = app.snapshot().context("No data loaded")?;
            let Some(stat) = snapshot.song_stats.stat(&name) else {
                println!("No song named \"{name}\".");
                return Ok(());
            };
            println!("{name}");
            println!(
                "  played {} times ({} outside medleys), last in {}",
                stat.total_count,
                stat.count_excluding_medley,
                year_or_dash(stat.last_year_played)
            );
            if let Some(info) = snapshot.payload.song_data.get(&name) {
                println!("  {} ({})", info.song_type().label(), year_or_dash(info.year));
            }
            let summary = category_summary(snapshot.records(), Some(&name), !no_medley);
            println!(
                "  Pop {}  Rock {}  Aloha {}  Event {}",
                summary.pop, summary.rock, summary.aloha, summary.other
            );
            println!();
            println!("{:<6} {:>5} {:>5} {:>5} {:>5} {:>5}", "Year", "Pop", "Rock", "Aloha", "Event", "None");
            for row in song_timeline(snapshot.records(), Some(&name), !no_medley) {
                println!(
                    "{:<6} {:>5} {:>5} {:>5} {:>5} {:>5}",
                    row.year, row.played.pop, row.played.rock, row.played.aloha, row.played.other, row.not_played()
                );
            }
        }

        Commands::Albums => {
            let snapshot = app.snapshot().context("No data loaded")?;
            let albums: Vec<_> = snapshot.payload.album_chart().collect();
            if albums.is_empty() {
                println!("No album data.");
                return Ok(());
            }
            let width = albums.iter().map(|a| a.album_name.chars().count()).max().unwrap_or(0).min(40);
            for album in albums {
                println!("{:<width$}  {:>5}", truncate(&album.album_name, 40), album.play_count);
            }
        }

        Commands::Patterns { limit } => {
            let snapshot = app.snapshot().context("No data loaded")?;
            for kind in PatternKind::ALL {
                println!("{}:", kind.label());
                let ranked = pattern_ranking(&snapshot.patterns, kind, &snapshot.song_stats.song_last_years, limit);
                print_ranking(&ranked);
                println!();
            }
        }

        Commands::Venues { search, select, limit } => {
            let snapshot = app.snapshot().context("No data loaded")?;
            print_places(&snapshot.venues, &search, limit);
            if let Some(venue) = select {
                print_place_chart(snapshot.records(), &PlaceSelection::Venue(venue));
            }
        }

        Commands::Regions { search, select, unvisited } => {
            let snapshot = app.snapshot().context("No data loaded")?;
            if unvisited {
                let missing = unvisited_prefectures(&snapshot.regions);
                println!("{} prefectures never played:", missing.len());
                println!("{}", missing.join(" "));
                return Ok(());
            }
            print_places(&snapshot.regions, &search, usize::MAX);
            if let Some(region) = select {
                print_place_chart(snapshot.records(), &PlaceSelection::Region(region));
            }
        }

        Commands::Today { force } => {
            let snapshot = app.snapshot().context("No data loaded")?;
            let today = anniversary::today_in(offset);
            let mut queue = AnniversaryQueue::default();
            if force {
                cache.remove(anniversary::LAST_GREETING_KEY)?;
            }
            let already = cache.last_greeting();
            let hits = anniversary::check_today(
                snapshot.records(),
                &snapshot.payload.list_data,
                today,
                offset,
                &mut cache,
                &mut queue,
            );
            if hits == 0 {
                if already.as_deref() == Some(anniversary::greeting_key(today).as_str()) {
                    println!("Already greeted today. Use --force to see again.");
                } else {
                    println!("Nothing happened on {}.", today.format("%m/%d"));
                }
                return Ok(());
            }
            for hit in queue.next_batch(false).unwrap_or_default() {
                print_anniversary(&hit, today, offset, config.history.birth_date);
                println!();
            }
        }

        Commands::Attend { date, off } => {
            if attendance::toggle_attendance(&mut app.user, &mut StdoutHost, &date, !off) {
                cache.save_user_data(&app.user).context("Failed to save user data")?;
                log::info!("{date}: attended = {}", !off);
            } else {
                eprintln!("Attendance needs a registered account (settings.syncId).");
            }
        }

        Commands::Memo { date, text } => {
            if attendance::save_memo(&mut app.user, &mut StdoutHost, &date, &text) {
                cache.save_user_data(&app.user).context("Failed to save user data")?;
            } else {
                eprintln!("Memos need a registered account (settings.syncId).");
            }
        }

        Commands::Mine { song, search, no_medley, limit } => {
            if !app.user.is_registered() {
                println!("Not registered. Send a userDataUpdated message with settings.syncId first.");
                return Ok(());
            }
            let records = app.records();
            if let Some(song) = song {
                let focus = attendance::song_focus(records, &app.user.attended_lives, &song, !no_medley);
                println!(
                    "{}: heard {} times at {} shows",
                    focus.song, focus.total_occurrences, focus.record_count
                );
                println!(
                    "  Pop {}  Rock {}  Aloha {}  Event {}",
                    focus.categories.pop, focus.categories.rock, focus.categories.aloha, focus.categories.other
                );
                for (year, count) in &focus.yearly {
                    println!("  {year}  {count}");
                }
                return Ok(());
            }

            let stats = attendance::user_stats(records, &app.user.attended_lives);
            println!("Attended {} shows", stats.attended);
            println!(
                "  Pop {}  Rock {}  Aloha {}  Event {}",
                stats.categories.pop, stats.categories.rock, stats.categories.aloha, stats.categories.other
            );
            for (year, count) in &stats.yearly {
                println!("  {year}  {count}");
            }
            println!();
            let ranked = attendance::personal_ranking(&stats, !no_medley, &search, SongSort::default());
            println!("{} songs heard", ranked.len());
            print_ranking(&ranked[..ranked.len().min(limit)]);
        }

        Commands::History { all } => {
            let snapshot = app.snapshot().context("No data loaded")?;
            let rows = encore::history::timeline(
                &snapshot.payload.history_data,
                config.history.start,
                anniversary::today_in(offset),
                config.history.birth_date,
                offset,
            );
            for row in rows.iter().filter(|r| all || !r.is_empty()) {
                let age = row.age.map(|a| a.to_string()).unwrap_or_default();
                let mut events: Vec<String> = row.lives.clone();
                events.extend(row.singles.iter().map(|s| format!("S: {s}")));
                events.extend(row.albums.iter().map(|a| format!("Al: {a}")));
                println!("{}/{:02} {:>3}  {}", row.year, row.month, age, events.join(", "));
            }
        }

        Commands::Message { json } => {
            let raw = if json == "-" {
                let mut buf = String::new();
                std::io::stdin().read_to_string(&mut buf).context("Failed to read stdin")?;
                buf
            } else {
                json
            };
            let message = InboundMessage::from_json(&raw).context("Invalid message")?;
            if matches!(message, InboundMessage::ExecLiveSearch { .. }) {
                app.load(loader.load(mode, &endpoint).map(|(payload, _)| payload));
            }
            let outcome = app.handle(message, || loader.load(LoadMode::NetworkOnly, &endpoint).map(|(p, _)| p));
            match outcome {
                MessageOutcome::UserDataReplaced => {
                    cache.save_user_data(&app.user).context("Failed to save user data")?;
                    println!("User data updated: {} attended shows", app.user.attended_lives.len());
                }
                MessageOutcome::SearchApplied(n) => {
                    println!("{n} shows match \"{}\"", app.filter.text);
                    for rec in app.visible_records() {
                        println!("  {:<12} {}", rec.date, rec.tour_name);
                    }
                }
                MessageOutcome::Refreshed(true) => println!("Data updated."),
                MessageOutcome::Refreshed(false) => println!("Update failed; keeping current data."),
            }
        }
    }

    Ok(())
}

fn fetch_spinner(mode: LoadMode) -> ProgressBar {
    if mode == LoadMode::CacheOnly {
        return ProgressBar::hidden();
    }
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::with_template("{spinner:.green} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message("Loading data...");
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

/// Type x release-year grid of one setlist, then the songs behind each cell.
fn print_composition_grid(composition: &Composition, catalog: &SongCatalog) {
    let Some(years) = composition.year_span() else {
        return;
    };
    let grid_types = [SongType::Title, SongType::Coupling, SongType::Album];
    println!();
    print!("{:<10}", "");
    for year in years.clone() {
        print!(" {:>2}", year % 100);
    }
    println!();
    for song_type in grid_types {
        print!("{:<10}", song_type.label());
        for year in years.clone() {
            match composition.cell(song_type, year).len() {
                0 => print!("  ."),
                n => print!(" {n:>2}"),
            }
        }
        println!();
    }

    for &(song_type, year) in composition.cells.keys() {
        for (release, songs) in composition.grouped_by_release(song_type, year, catalog) {
            let release = release.map(|r| format!(" [{r}]")).unwrap_or_default();
            println!("  {year} {}{release}: {}", song_type.label(), songs.join(", "));
        }
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() > max {
        let head: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{head}...")
    } else {
        s.to_string()
    }
}

fn year_or_dash(year: i32) -> String {
    if year == 0 { "-".to_string() } else { year.to_string() }
}

fn print_ranking(entries: &[RankedEntry]) {
    for e in entries {
        println!(
            "{:>4}  {:<40} {:>5}  ({})",
            e.rank,
            truncate(&e.name, 40),
            e.count,
            year_or_dash(e.last_year)
        );
    }
}

fn print_places(tables: &PlaceTables, search: &str, limit: usize) {
    let ranked = tables.ranking(search);
    println!("{} places", ranked.len());
    println!();
    print_ranking(&ranked[..ranked.len().min(limit)]);
}

fn print_place_chart(records: &[encore::models::LiveRecord], selection: &PlaceSelection) {
    println!();
    println!("{} by year:", selection.name());
    for row in place_timeline(records, Some(selection)) {
        if row.selected > 0 {
            println!("  {}  {:>3} / {:>3}", row.year, row.selected, row.total);
        }
    }
}

fn print_anniversary(hit: &AnniversaryHit, today: chrono::NaiveDate, offset: chrono::FixedOffset, birth: chrono::NaiveDate) {
    let years = hit.years_since(today, offset).unwrap_or(0);
    let ago = if years > 0 { format!("{years} years ago today") } else { "Today".to_string() };
    match hit {
        AnniversaryHit::Live(rec) => {
            println!("{ago}: [{}] {}", rec.series().label(), rec.tour_name);
            println!("  {} ({})  {} ({})  {} songs", rec.date, rec.day_of_week, rec.venue, rec.region, rec.song_count);
        }
        AnniversaryHit::Release(item) => {
            println!("{ago}: {} [{}]", item.title, item.kind.as_deref().unwrap_or("-"));
            if let Some(date) = hit.date(offset) {
                let age = anniversary::age_on(birth, date);
                println!(
                    "  released {}, at {}y {}m {}d ({} days)",
                    date.format("%Y.%-m.%-d"),
                    age.years,
                    age.months,
                    age.days,
                    age.total_days
                );
            }
            for (i, track) in item.track_list().iter().enumerate() {
                println!("  {:>2}. {track}", i + 1);
            }
        }
    }
}
