//! Argument lists for the resize and metadata tools.

use std::ffi::OsString;
use std::path::Path;

use crate::types::PreviewPass;

/// `-i <source> -o <output>`
pub fn resize(source: &Path, output: &Path) -> Vec<OsString> {
    vec![
        "-i".into(),
        source.as_os_str().to_owned(),
        "-o".into(),
        output.as_os_str().to_owned(),
    ]
}

/// Arguments that write each RAW's embedded preview as `<output>/<stem>.jpg`.
///
/// CR2/ARW previews overwrite existing files (`-w!`), so a RAW preview wins
/// over a resized JPEG of the same stem. NEF previews use `-w` and never
/// overwrite.
pub fn previews(pass: PreviewPass, source: &Path, output: &Path) -> Vec<OsString> {
    let template = output.join("%f.jpg").into_os_string();
    match pass {
        PreviewPass::CanonSony => vec![
            "-ext".into(),
            "cr2".into(),
            "-ext".into(),
            "arw".into(),
            "-b".into(),
            "-previewimage".into(),
            "-w!".into(),
            template,
            "-r".into(),
            source.as_os_str().to_owned(),
        ],
        PreviewPass::Nikon => vec![
            "-b".into(),
            "-jpgfromraw".into(),
            "-w".into(),
            template,
            "-ext".into(),
            "nef".into(),
            "-r".into(),
            source.as_os_str().to_owned(),
        ],
    }
}

/// Copy every tag from `donor` into `recipient`, rewriting it in place.
pub fn copy_tags(donor: &Path, recipient: &Path) -> Vec<OsString> {
    vec![
        "-tagsFromFile".into(),
        donor.as_os_str().to_owned(),
        "-all:all".into(),
        "-overwrite_original".into(),
        recipient.as_os_str().to_owned(),
    ]
}
