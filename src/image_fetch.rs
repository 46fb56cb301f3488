//! Concurrent download and decode of per-station radar PNGs.

use std::sync::{Arc, Mutex};
use std::thread;

use image::DynamicImage;

use crate::error::{RadarError, Result};
use crate::registry::StationDetail;

/// Downloads and decodes the latest frame for each of `details`, one thread
/// per station. The result vector is pre-sized to `details.len()` so
/// indices line up with the input slice; a station whose fetch or decode
/// fails leaves its slot `None` only when every station fails — the first
/// failure encountered is surfaced as an error, matching the "atomic
/// render" contract in the error taxonomy.
pub fn fetch_images(details: &[StationDetail]) -> Result<Vec<Option<DynamicImage>>> {
    let slots: Arc<Mutex<Vec<Option<DynamicImage>>>> =
        Arc::new(Mutex::new((0..details.len()).map(|_| None).collect()));
    let first_error: Arc<Mutex<Option<RadarError>>> = Arc::new(Mutex::new(None));

    thread::scope(|scope| {
        for (index, detail) in details.iter().enumerate() {
            let slots = Arc::clone(&slots);
            let first_error = Arc::clone(&first_error);
            scope.spawn(move || {
                let Some(frame) = detail.latest() else {
                    return;
                };
                match fetch_one(&frame.image_url, detail.code()) {
                    Ok(image) => slots.lock().unwrap()[index] = Some(image),
                    Err(e) => {
                        let mut slot = first_error.lock().unwrap();
                        if slot.is_none() {
                            *slot = Some(e);
                        }
                    }
                }
            });
        }
    });

    if let Some(e) = Arc::try_unwrap(first_error).unwrap().into_inner().unwrap() {
        return Err(e);
    }

    Ok(Arc::try_unwrap(slots).unwrap().into_inner().unwrap())
}

fn fetch_one(url: &str, code: &str) -> Result<DynamicImage> {
    let bytes = crate::http::get(url, &[])?;
    image::load_from_memory(&bytes).map_err(|e| RadarError::DecodeError {
        code: code.to_string(),
        cause: e.to_string(),
    })
}
