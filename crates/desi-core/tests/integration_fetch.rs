//! Integration tests: the fetch layer against a local HTTP server.
//!
//! Covers range reads, staging, the whole-file fallbacks, the cache and errors.

mod common;

use std::io::{Read, Seek, SeekFrom};

use common::archive_server::{self, ServerOptions};
use desi_core::archive_path::ArchiveRoot;
use desi_core::extract::{read_spectra, SpectraOptions, TargetSelector};
use desi_core::fetch::{
    download, get_to_writer, open_location, probe, stage_location, ArchiveReader, Cache,
    FetchError, HttpOptions, RangeReader, StagedFile, BLOCK_SIZE,
};
use desi_core::fits::FitsFile;
use desi_core::gaia_index::{read_record, read_row_fields, ROW_HEADER_LEN};
use serde_pickle::SerOptions;
use tempfile::tempdir;

const PATH: &str = "desi/spectro/redux/loa/tiles/1000/20210517/coadd-2-1000-20210517.fits";

fn serve(body: Vec<u8>, opts: ServerOptions) -> (archive_server::ArchiveServer, String) {
    let server = archive_server::start(vec![(PATH.to_string(), body)], opts);
    let url = format!("{}{}", server.base_url, PATH);
    (server, url)
}

#[test]
fn probe_reports_size_and_ranges() {
    let body = vec![1u8; 5000];
    let (_server, url) = serve(body, ServerOptions::default());
    let head = probe(&url, &HttpOptions::default()).unwrap();
    assert_eq!(head.content_length, Some(5000));
    assert!(head.accept_ranges);

    let (_server, url) = serve(
        vec![1u8; 10],
        ServerOptions {
            support_ranges: false,
            ..ServerOptions::default()
        },
    );
    assert!(!probe(&url, &HttpOptions::default()).unwrap().accept_ranges);
}

#[test]
fn range_reader_matches_body() {
    let body: Vec<u8> = (0u8..=250).cycle().take(100_000).collect();
    let (server, url) = serve(body.clone(), ServerOptions::default());
    let mut reader = RangeReader::new(&url, body.len() as u64, HttpOptions::default()).unwrap();

    let mut small = [0u8; 100];
    reader.seek(SeekFrom::Start(31_000)).unwrap();
    reader.read_exact(&mut small).unwrap();
    assert_eq!(&small[..], &body[31_000..31_100]);
    // Same block: no new request.
    reader.read_exact(&mut small).unwrap();
    assert_eq!(&small[..], &body[31_100..31_200]);
    assert_eq!(reader.requests(), 1);
    assert_eq!(server.requests()[0].range, Some((BLOCK_SIZE, 2 * BLOCK_SIZE - 1)));

    reader.seek(SeekFrom::End(-10)).unwrap();
    let mut tail = Vec::new();
    reader.read_to_end(&mut tail).unwrap();
    assert_eq!(tail, &body[body.len() - 10..]);

    reader.seek(SeekFrom::Start(0)).unwrap();
    let mut all = Vec::new();
    reader.read_to_end(&mut all).unwrap();
    assert_eq!(all, body);
}

#[test]
fn remote_fits_is_staged_then_read() {
    let body = common::spectra_file(false);
    let (server, url) = serve(body, ServerOptions::default());
    let location = ArchiveRoot::Http(server.base_url.parse().unwrap())
        .resolve(PATH)
        .unwrap();
    assert_eq!(location.to_string(), url);

    let staged = stage_location(&location, &HttpOptions::default(), None).unwrap();
    assert!(matches!(staged, StagedFile::Temp(_)));
    let path = staged.path().to_path_buf();
    {
        let mut fits = FitsFile::open(&path).unwrap();
        let out = read_spectra(
            &mut fits,
            &TargetSelector::target(common::TARGET_B),
            SpectraOptions::default(),
        )
        .unwrap();
        assert_eq!(out.len(), 1);
        let r = out[0].arm(desi_core::extract::Arm::R).unwrap();
        assert_eq!(r.flux.len(), common::PIXELS);
        assert_eq!(r.flux[7], 10007.0);
    }
    assert_eq!(server.gets(), 1);
    drop(staged);
    assert!(!path.exists());
}

#[test]
fn gaia_record_is_read_with_ranges_only() {
    let fields = vec!["SURVEY", "PROGRAM", "hpx", "TARGETID"];
    let mut body = serde_pickle::to_vec(&fields, SerOptions::new()).unwrap();
    body.resize(ROW_HEADER_LEN as usize, 0);
    let mut spans = Vec::new();
    for i in 0..20_000i64 {
        let record =
            serde_pickle::to_vec(&("main", "dark", 10032 + i % 7, 1000 + i), SerOptions::new())
                .unwrap();
        let start = body.len() as i64;
        body.extend_from_slice(&record);
        spans.push((start, body.len() as i64));
    }
    let total = body.len() as u64;
    let (server, url) = serve(body, ServerOptions::default());
    let location = ArchiveRoot::Http(server.base_url.parse().unwrap())
        .resolve(PATH)
        .unwrap();
    assert_eq!(location.to_string(), url);

    let mut reader = open_location(&location, &HttpOptions::default(), None).unwrap();
    assert!(matches!(reader, ArchiveReader::Remote(_)));
    let fields = read_row_fields(&mut reader).unwrap();
    let found = read_record(&mut reader, &fields, spans[15_000], 77).unwrap();
    assert_eq!(found.target_id, 16_000);
    assert_eq!(found.healpix, 10032 + 15_000 % 7);

    let gets: Vec<_> = server
        .requests()
        .into_iter()
        .filter(|r| r.method == "GET")
        .collect();
    assert!(gets.iter().all(|r| r.range.is_some()));
    assert!(
        server.body_bytes() < total / 2,
        "read {} of {} bytes",
        server.body_bytes(),
        total
    );
}

#[test]
fn blocked_head_falls_back_to_whole_get() {
    let body = common::spectra_file(false);
    let (server, url) = serve(
        body.clone(),
        ServerOptions {
            head_allowed: false,
            ..ServerOptions::default()
        },
    );
    let location = ArchiveRoot::Http(server.base_url.parse().unwrap())
        .resolve(PATH)
        .unwrap();
    let mut reader = open_location(&location, &HttpOptions::default(), None).unwrap();
    assert!(matches!(reader, ArchiveReader::Memory(_)));
    let mut got = Vec::new();
    reader.read_to_end(&mut got).unwrap();
    assert_eq!(got, body);
    assert_eq!(server.gets(), 1);
    assert!(url.ends_with(PATH));
}

#[test]
fn server_without_ranges_is_fetched_whole() {
    let (server, _url) = serve(
        common::spectra_file(false),
        ServerOptions {
            support_ranges: false,
            ..ServerOptions::default()
        },
    );
    let location = ArchiveRoot::Http(server.base_url.parse().unwrap())
        .resolve(PATH)
        .unwrap();
    let reader = open_location(&location, &HttpOptions::default(), None).unwrap();
    assert!(matches!(reader, ArchiveReader::Memory(_)));
}

#[test]
fn cache_downloads_once() {
    let body = vec![9u8; 4096];
    let (server, url) = serve(body.clone(), ServerOptions::default());
    let dir = tempdir().unwrap();
    let cache = Cache::new(dir.path());

    let first = cache.fetch(&url, PATH, &HttpOptions::default()).unwrap();
    assert_eq!(first, dir.path().join(PATH));
    assert_eq!(std::fs::read(&first).unwrap(), body);
    let second = cache.fetch(&url, PATH, &HttpOptions::default()).unwrap();
    assert_eq!(first, second);
    assert_eq!(server.gets(), 1);
}

#[test]
fn failed_download_leaves_no_cache_entry() {
    let (server, _url) = serve(vec![0u8; 10], ServerOptions::default());
    let dir = tempdir().unwrap();
    let cache = Cache::new(dir.path());
    let missing = "desi/missing.fits";
    let err = cache
        .fetch(
            &format!("{}{}", server.base_url, missing),
            missing,
            &HttpOptions::default(),
        )
        .unwrap_err();
    assert_eq!(err.status(), Some(404));
    assert!(!cache.contains(missing));
}

#[test]
fn get_reports_http_status() {
    let (server, _url) = serve(vec![0u8; 10], ServerOptions::default());
    let mut sink = Vec::new();
    let err = get_to_writer(
        &format!("{}nope.fits", server.base_url),
        &HttpOptions::default(),
        &mut sink,
    )
    .unwrap_err();
    assert!(matches!(err, FetchError::Http { status: 404, .. }));
}

#[test]
fn download_writes_destination() {
    let body = common::spectra_file(true);
    let (server, _url) = serve(body.clone(), ServerOptions::default());
    let location = ArchiveRoot::Http(server.base_url.parse().unwrap())
        .resolve(PATH)
        .unwrap();
    let dir = tempdir().unwrap();
    let dest = dir.path().join("out.fits");
    let n = download(&location, &HttpOptions::default(), &dest).unwrap();
    assert_eq!(n, body.len() as u64);
    assert_eq!(std::fs::read(&dest).unwrap(), body);
}
