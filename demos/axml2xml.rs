use axml::android::apk::MANIFEST_ENTRY;
use axml::{decode_xml, ApkArchive};
use std::env;
use std::error::Error;
use std::fs;
use std::io::{self, Write};
use std::path::Path;

// Prints the text form of a binary XML file, or of one entry inside an APK.
//Usage: axml2xml <file.xml | app.apk> [entry]
fn main() {
    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        println!("Usage: axml2xml <file.xml | app.apk> [entry]");
        return;
    }

    // Do everything else with the error trap
    let entry = args.get(2).map(String::as_str).unwrap_or(MANIFEST_ENTRY);
    if let Err(e) = process_file(&args[1], entry) {
        println!("Aborted due to error: {:?}", e);
    }
}

fn process_file(path: &str, entry: &str) -> Result<(), Box<dyn Error>> {
    let path = Path::new(path);
    let is_apk = path
        .extension()
        .map_or(false, |ext| ext.eq_ignore_ascii_case("apk") || ext.eq_ignore_ascii_case("zip"));

    let xml = if is_apk {
        let apk = ApkArchive::from_file(path)?;
        if entry == "--list" {
            for name in apk.xml_entries() {
                println!("{name}");
            }
            return Ok(());
        }
        apk.decode_xml_entry(entry, &axml::NoResolution)?
    } else {
        decode_xml(&fs::read(path)?)?
    };

    let mut stdout = io::stdout().lock();
    stdout.write_all(&xml)?;
    writeln!(stdout)?;
    Ok(())
}
