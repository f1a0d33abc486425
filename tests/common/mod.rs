//! Shared test fixtures: synthesized EPUB archives built in memory.

#![allow(dead_code)]

use std::io::{Cursor, Write};

use zip::ZipWriter;
use zip::write::SimpleFileOptions;

/// Build a ZIP archive with the EPUB mimetype entry plus the given files.
pub fn build_archive(files: &[(&str, &[u8])]) -> Vec<u8> {
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    let stored = SimpleFileOptions::default().compression_method(zip::CompressionMethod::Stored);
    let deflated =
        SimpleFileOptions::default().compression_method(zip::CompressionMethod::Deflated);

    zip.start_file("mimetype", stored).unwrap();
    zip.write_all(b"application/epub+zip").unwrap();

    for (path, data) in files {
        zip.start_file(*path, deflated).unwrap();
        zip.write_all(data).unwrap();
    }

    zip.finish().unwrap().into_inner()
}

pub const CONTAINER_XML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<container version="1.0" xmlns="urn:oasis:names:tc:opendocument:xmlns:container">
  <rootfiles>
    <rootfile full-path="OEBPS/content.opf" media-type="application/oebps-package+xml"/>
  </rootfiles>
</container>"#;

/// Build a complete EPUB 2 archive from (filename, body markup, title)
/// chapter triples. Filenames are relative to `OEBPS/text/`; an NCX is
/// generated with the given titles.
pub fn epub_with_chapters(chapters: &[(&str, &str, &str)]) -> Vec<u8> {
    let mut manifest = String::new();
    let mut spine = String::new();
    let mut navpoints = String::new();

    for (i, (file, _, title)) in chapters.iter().enumerate() {
        manifest.push_str(&format!(
            r#"<item id="ch{i}" href="text/{file}" media-type="application/xhtml+xml"/>"#
        ));
        spine.push_str(&format!(r#"<itemref idref="ch{i}"/>"#));
        navpoints.push_str(&format!(
            r#"<navPoint id="np{i}" playOrder="{}">
  <navLabel><text>{title}</text></navLabel>
  <content src="text/{file}"/>
</navPoint>"#,
            i + 1
        ));
    }

    let opf = format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<package xmlns="http://www.idpf.org/2007/opf" version="2.0" unique-identifier="BookId">
  <metadata xmlns:dc="http://purl.org/dc/elements/1.1/">
    <dc:title>바람의 책</dc:title>
    <dc:creator>김작가</dc:creator>
    <dc:language>ko</dc:language>
  </metadata>
  <manifest>
    {manifest}
    <item id="ncx" href="toc.ncx" media-type="application/x-dtbncx+xml"/>
  </manifest>
  <spine toc="ncx">{spine}</spine>
</package>"#
    );

    let ncx = format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<ncx xmlns="http://www.daisy.org/z3986/2005/ncx/" version="2005-1">
  <navMap>{navpoints}</navMap>
</ncx>"#
    );

    let mut files: Vec<(String, Vec<u8>)> = vec![
        ("META-INF/container.xml".to_string(), CONTAINER_XML.as_bytes().to_vec()),
        ("OEBPS/content.opf".to_string(), opf.into_bytes()),
        ("OEBPS/toc.ncx".to_string(), ncx.into_bytes()),
    ];
    for (file, body, _) in chapters {
        let html = format!(
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<html xmlns=\"http://www.w3.org/1999/xhtml\"><head><title></title></head><body>{body}</body></html>"
        );
        files.push((format!("OEBPS/text/{file}"), html.into_bytes()));
    }

    let refs: Vec<(&str, &[u8])> = files
        .iter()
        .map(|(p, d)| (p.as_str(), d.as_slice()))
        .collect();
    build_archive(&refs)
}

/// A Korean paragraph with clear sentence boundaries, repeated to the
/// requested sentence count.
pub fn korean_text(sentences: usize) -> String {
    "밤이 깊어도 그는 책을 놓지 않았다. ".repeat(sentences)
}

/// A three-chapter book with enough text to paginate across several pages
/// at common viewport sizes.
pub fn three_chapter_epub() -> Vec<u8> {
    let ch1 = format!("<h1>첫째 장</h1><p>{}</p>", korean_text(120));
    let ch2 = format!("<h1>둘째 장</h1><p>{}</p>", korean_text(160));
    let ch3 = format!("<h1>셋째 장</h1><p>{}</p>", korean_text(80));
    epub_with_chapters(&[
        ("ch1.xhtml", &ch1, "첫째 장"),
        ("ch2.xhtml", &ch2, "둘째 장"),
        ("ch3.xhtml", &ch3, "셋째 장"),
    ])
}
