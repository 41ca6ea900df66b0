//! Integration tests for whole crawls over a scripted browser
mod common;

use common::{notam_page, read_csv, tender_page, test_config, ScriptedDriver};
use paa_scraper::metrics::RunOutcome;
use paa_scraper::models::{NotamRecord, Record, TenderRecord};
use paa_scraper::runner;
use paa_scraper::sources::notams::NotamExtractor;
use paa_scraper::sources::tenders::TenderExtractor;
use paa_scraper::PageState;
use std::future::pending;

#[tokio::test(start_paused = true)]
async fn test_two_row_page_gives_three_line_csv() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path());
    let driver = ScriptedDriver::new(vec![notam_page(&["A0001/24", "A0002/24"], true)]);
    let extractor = NotamExtractor::new(config.notams.clone()).unwrap();

    let mut crawler = runner::build(&config, &config.notams.listing, driver, extractor).unwrap();
    let code = runner::drive(&mut crawler, pending()).await;

    assert_eq!(code, 0);
    assert_eq!(crawler.state(), PageState::Done);

    let rows = read_csv(&config.notams.listing.output);
    assert_eq!(rows.len(), 3);
    assert_eq!(rows[0], NotamRecord::COLUMNS);
    assert_eq!(rows[1][0], "A0001/24");
    assert_eq!(rows[1][1], "2401051200");
    assert_eq!(rows[2][0], "A0002/24");
    assert!(rows[2][7].contains("RWY 07L CLSD"));
    assert_eq!(crawler.navigator().driver().details_read, 2);
}

#[tokio::test(start_paused = true)]
async fn test_n_pages_take_n_navigation_steps() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path());
    let pages = vec![
        notam_page(&["A0001/24", "A0002/24"], false),
        notam_page(&["A0003/24", "A0004/24"], false),
        notam_page(&["A0005/24", "A0006/24"], false),
        notam_page(&["A0007/24"], true),
    ];
    let driver = ScriptedDriver::new(pages);
    let extractor = NotamExtractor::new(config.notams.clone()).unwrap();

    let mut crawler = runner::build(&config, &config.notams.listing, driver, extractor).unwrap();
    crawler.run().await.unwrap();

    let metrics = crawler.metrics();
    assert_eq!(metrics.navigation_steps, 4);
    assert_eq!(metrics.pages_visited, 4);
    assert_eq!(metrics.records_written, 7);
    assert_eq!(metrics.retries, 0);
    assert_eq!(crawler.navigator().driver().gotos, 1);
    assert_eq!(crawler.navigator().driver().next_clicks, 3);
    assert_eq!(read_csv(&config.notams.listing.output).len(), 8);
}

#[tokio::test(start_paused = true)]
async fn test_notam_run_aborts_after_three_failed_advances() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path());
    let pages = vec![
        notam_page(&["A0001/24", "A0002/24"], false),
        notam_page(&["A0003/24"], true),
    ];
    let driver = ScriptedDriver::new(pages).failing_next(3);
    let extractor = NotamExtractor::new(config.notams.clone()).unwrap();

    let mut crawler = runner::build(&config, &config.notams.listing, driver, extractor).unwrap();
    let code = runner::drive(&mut crawler, pending()).await;

    assert_eq!(code, 1);
    assert_eq!(crawler.state(), PageState::Aborted);

    let metrics = crawler.metrics();
    assert!(matches!(metrics.outcome, RunOutcome::Aborted { .. }));
    assert_eq!(metrics.retries, 2);
    assert_eq!(metrics.artifacts.len(), 1);
    assert!(metrics.artifacts[0].exists());
    assert!(metrics.artifacts[0].starts_with(dir.path().join("diagnostics")));
    assert!(metrics.artifacts[0].with_extension("html").exists());

    // the first page stays on disk
    assert_eq!(read_csv(&config.notams.listing.output).len(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_tender_run_skips_failed_advance_and_continues() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path());
    let pages = vec![
        tender_page(
            &[
                ["1", "Fencing", "Karachi", "01-03-2024", "15-03-2024"],
                ["2", "CCTV", "Lahore", "02-03-2024", "16-03-2024"],
            ],
            false,
            false,
        ),
        tender_page(&[["3", "Paving", "Quetta", "03-03-2024", "17-03-2024"]], true, false),
    ];
    let driver = ScriptedDriver::new(pages).failing_next(3);
    let extractor = TenderExtractor::new(config.tenders.clone()).unwrap();

    let mut crawler = runner::build(&config, &config.tenders.listing, driver, extractor).unwrap();
    let code = runner::drive(&mut crawler, pending()).await;

    assert_eq!(code, 0);
    let metrics = crawler.metrics();
    assert_eq!(metrics.outcome, RunOutcome::Completed);
    // page 1 was written, so a failed advance is not a skipped page
    assert_eq!(metrics.pages_skipped, 0);
    assert_eq!(metrics.advance_failures, 1);
    assert_eq!(metrics.artifacts.len(), 1);
    assert_eq!(metrics.navigation_steps, 2);
    assert_eq!(metrics.records_written, 3);

    let rows = read_csv(&config.tenders.listing.output);
    let ids: Vec<&str> = rows[1..].iter().map(|r| r[0].as_str()).collect();
    assert_eq!(ids, ["1", "2", "3"]);
}

#[tokio::test(start_paused = true)]
async fn test_tender_run_stops_after_consecutive_skips() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path());
    let pages = vec![
        tender_page(&[["1", "Fencing", "Karachi", "01-03-2024", "15-03-2024"]], false, false),
        tender_page(&[["2", "CCTV", "Lahore", "02-03-2024", "16-03-2024"]], true, false),
    ];
    let driver = ScriptedDriver::new(pages).failing_next(usize::MAX);
    let extractor = TenderExtractor::new(config.tenders.clone()).unwrap();

    let mut crawler = runner::build(&config, &config.tenders.listing, driver, extractor).unwrap();
    let code = runner::drive(&mut crawler, pending()).await;

    assert_eq!(code, 0);
    let metrics = crawler.metrics();
    assert_eq!(metrics.pages_skipped, 0);
    assert_eq!(metrics.advance_failures, 3);
    assert_eq!(metrics.artifacts.len(), 3);
    assert_eq!(metrics.records_written, 1);
}

#[tokio::test(start_paused = true)]
async fn test_tender_run_skips_page_with_unreadable_rows() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path());
    let pages = vec![
        // header row only: the page renders but no data row parses
        tender_page(&[], false, false),
        tender_page(&[["3", "Paving", "Quetta", "03-03-2024", "17-03-2024"]], true, false),
    ];
    let driver = ScriptedDriver::new(pages);
    let extractor = TenderExtractor::new(config.tenders.clone()).unwrap();

    let mut crawler = runner::build(&config, &config.tenders.listing, driver, extractor).unwrap();
    let code = runner::drive(&mut crawler, pending()).await;

    assert_eq!(code, 0);
    assert_eq!(crawler.state(), PageState::Done);
    let metrics = crawler.metrics();
    assert_eq!(metrics.outcome, RunOutcome::Completed);
    assert_eq!(metrics.pages_visited, 2);
    assert_eq!(metrics.pages_skipped, 1);
    assert_eq!(metrics.advance_failures, 0);
    assert_eq!(metrics.retries, 2);
    assert_eq!(metrics.artifacts.len(), 1);
    assert!(metrics.artifacts[0].exists());
    assert_eq!(metrics.records_written, 1);

    let rows = read_csv(&config.tenders.listing.output);
    let ids: Vec<&str> = rows[1..].iter().map(|r| r[0].as_str()).collect();
    assert_eq!(ids, ["3"]);
}

const MAINTENANCE: &str = "<html><body><h1>Down for maintenance</h1></body></html>";

#[tokio::test(start_paused = true)]
async fn test_failed_open_aborts_under_both_policies() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path());

    let driver = ScriptedDriver::new(vec![MAINTENANCE.to_string()]);
    let extractor = NotamExtractor::new(config.notams.clone()).unwrap();
    let mut notams = runner::build(&config, &config.notams.listing, driver, extractor).unwrap();
    assert_eq!(runner::drive(&mut notams, pending()).await, 1);

    let driver = ScriptedDriver::new(vec![MAINTENANCE.to_string()]);
    let extractor = TenderExtractor::new(config.tenders.clone()).unwrap();
    let mut tenders = runner::build(&config, &config.tenders.listing, driver, extractor).unwrap();
    assert_eq!(runner::drive(&mut tenders, pending()).await, 1);

    for (metrics, output, columns) in [
        (notams.metrics(), &config.notams.listing.output, NotamRecord::COLUMNS),
        (tenders.metrics(), &config.tenders.listing.output, TenderRecord::COLUMNS),
    ] {
        assert!(matches!(metrics.outcome, RunOutcome::Aborted { .. }));
        assert_eq!(metrics.navigation_steps, 0);
        assert_eq!(metrics.pages_skipped, 0);
        assert_eq!(metrics.retries, 2);
        assert_eq!(metrics.artifacts.len(), 1);
        assert!(metrics.artifacts[0].exists());

        let rows = read_csv(output);
        assert_eq!(rows, [columns.to_vec()]);
    }
    assert_eq!(notams.state(), PageState::Aborted);
    assert_eq!(tenders.state(), PageState::Aborted);
}

#[tokio::test(start_paused = true)]
async fn test_empty_tender_id_is_dropped_and_missing_closing_date_kept_empty() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path());
    let pages = vec![tender_page(
        &[
            ["", "Orphan row", "Karachi", "01-03-2024", "15-03-2024"],
            ["4", "Runway lights", "Multan", "04-03-2024", ""],
        ],
        true,
        false,
    )];
    let driver = ScriptedDriver::new(pages);
    let extractor = TenderExtractor::new(config.tenders.clone()).unwrap();

    let mut crawler = runner::build(&config, &config.tenders.listing, driver, extractor).unwrap();
    crawler.run().await.unwrap();

    assert_eq!(crawler.metrics().records_dropped, 1);
    assert_eq!(crawler.metrics().records_written, 1);

    let rows = read_csv(&config.tenders.listing.output);
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0], TenderRecord::COLUMNS);
    let closing = TenderRecord::COLUMNS
        .iter()
        .position(|c| *c == "closing_date")
        .unwrap();
    assert_eq!(rows[1][0], "4");
    assert_eq!(rows[1][closing], "");
    assert!(rows.iter().all(|r| !r[0].is_empty()));
}

#[tokio::test(start_paused = true)]
async fn test_duplicates_skipped_and_header_stable_across_runs() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path());
    let pages = || {
        vec![
            notam_page(&["A0001/24", "A0002/24"], false),
            notam_page(&["A0002/24", "A0003/24"], true),
        ]
    };

    for _ in 0..2 {
        let driver = ScriptedDriver::new(pages());
        let extractor = NotamExtractor::new(config.notams.clone()).unwrap();
        let mut crawler =
            runner::build(&config, &config.notams.listing, driver, extractor).unwrap();
        crawler.run().await.unwrap();
        assert_eq!(crawler.metrics().duplicates_skipped, 1);
        assert_eq!(crawler.metrics().records_written, 3);
    }

    let rows = read_csv(&config.notams.listing.output);
    assert_eq!(rows.len(), 7);
    assert_eq!(rows.iter().filter(|r| r[0] == "reference_id").count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_tender_details_panel_fills_extra_fields() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path());
    let pages = vec![tender_page(
        &[["9", "Apron works", "Islamabad", "05-03-2024", "20-03-2024"]],
        true,
        true,
    )];
    let driver = ScriptedDriver::new(pages);
    let extractor = TenderExtractor::new(config.tenders.clone()).unwrap();

    let mut crawler = runner::build(&config, &config.tenders.listing, driver, extractor).unwrap();
    crawler.run().await.unwrap();
    assert!(!crawler.navigator().driver().panel_open);

    let rows = read_csv(&config.tenders.listing.output);
    let column = |name: &str| {
        TenderRecord::COLUMNS
            .iter()
            .position(|c| *c == name)
            .unwrap()
    };
    assert_eq!(rows[1][column("category")], "Works");
    assert_eq!(rows[1][column("description")], "Apron resurfacing");
    assert!(rows[1][column("document_link")].ends_with("/docs/tender.pdf"));
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_marks_run_interrupted() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path());
    let pages = vec![
        notam_page(&["A0001/24"], false),
        notam_page(&["A0002/24"], true),
    ];
    let driver = ScriptedDriver::new(pages);
    let extractor = NotamExtractor::new(config.notams.clone()).unwrap();

    let mut crawler = runner::build(&config, &config.notams.listing, driver, extractor).unwrap();
    let code = runner::drive(&mut crawler, async {}).await;

    assert_eq!(code, 130);
    assert_eq!(crawler.metrics().outcome, RunOutcome::Interrupted);
    // the header was written when the sink opened
    assert!(!read_csv(&config.notams.listing.output).is_empty());
}
