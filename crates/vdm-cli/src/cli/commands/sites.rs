//! `vdm sites` – list sites with built-in handling.

use vdm_core::site::BuiltinSites;

pub fn run_sites() {
    for site in BuiltinSites::supported() {
        println!("{:<10} {}", site.as_str(), site.display_name());
    }
    println!("Other URLs are passed to yt-dlp unchanged.");
}
