#![allow(dead_code)]

use apk_parser::testing::{encode_binary_xml, TableBuilder, XmlElement};
use flate2::write::DeflateEncoder;
use flate2::{Compression, Crc};
use image::{DynamicImage, ImageOutputFormat, Rgba, RgbaImage};
use plist::{Dictionary, Value};
use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

pub const LABEL_ID: u32 = 0x7f0b_0000;
pub const ICON_ID: u32 = 0x7f08_0000;

pub const MDPI_ICON: &str = "res/mipmap-mdpi-v4/ic_launcher.png";
pub const XXHDPI_ICON: &str = "res/mipmap-xxhdpi-v4/ic_launcher.png";
pub const ADAPTIVE_ICON: &str = "res/mipmap-anydpi-v26/ic_launcher.xml";

/// Write a zip archive named `file_name` into `dir`
pub fn archive(dir: &TempDir, file_name: &str, members: &[(&str, Vec<u8>)]) -> PathBuf {
    write_archive(dir, file_name, members, FileOptions::default())
}

/// Like [archive], but members are stored uncompressed
pub fn stored_archive(dir: &TempDir, file_name: &str, members: &[(&str, Vec<u8>)]) -> PathBuf {
    let options = FileOptions::default().compression_method(CompressionMethod::Stored);
    write_archive(dir, file_name, members, options)
}

/// Flip one byte in the middle of `member`'s stored data, leaving its
/// checksum stale
pub fn corrupt_stored_member(path: &Path, member: &[u8]) {
    let mut bytes = std::fs::read(path).unwrap();
    let start = bytes
        .windows(member.len())
        .position(|w| w == member)
        .unwrap();
    bytes[start + member.len() / 2] ^= 0xff;
    std::fs::write(path, bytes).unwrap();
}

fn write_archive(
    dir: &TempDir,
    file_name: &str,
    members: &[(&str, Vec<u8>)],
    options: FileOptions,
) -> PathBuf {
    let path = dir.path().join(file_name);
    let mut writer = ZipWriter::new(std::fs::File::create(&path).unwrap());
    for (name, data) in members {
        writer.start_file(*name, options).unwrap();
        writer.write_all(data).unwrap();
    }
    writer.finish().unwrap();
    path
}

pub fn helloworld_manifest() -> Vec<u8> {
    let launcher = XmlElement::new("activity")
        .android_attr("name", 0x0101_0003, "com.example.helloworld.MainActivity")
        .child(
            XmlElement::new("intent-filter")
                .child(XmlElement::new("action").android_attr(
                    "name",
                    0x0101_0003,
                    "android.intent.action.MAIN",
                ))
                .child(XmlElement::new("category").android_attr(
                    "name",
                    0x0101_0003,
                    "android.intent.category.LAUNCHER",
                )),
        );
    let root = XmlElement::new("manifest")
        .attr("package", "com.example.helloworld")
        .android_int("versionCode", 0x0101_021b, 1)
        .android_attr("versionName", 0x0101_021c, "1.0")
        .child(
            XmlElement::new("uses-sdk")
                .android_int("minSdkVersion", 0x0101_020c, 21)
                .android_int("targetSdkVersion", 0x0101_0270, 33),
        )
        .child(
            XmlElement::new("uses-permission")
                .android_attr("name", 0x0101_0003, "android.permission.INTERNET"),
        )
        .child(
            XmlElement::new("application")
                .android_ref("label", 0x0101_0001, LABEL_ID)
                .android_ref("icon", 0x0101_0002, ICON_ID)
                .child(launcher),
        );
    encode_binary_xml(&root, false)
}

/// Label plus an icon with mdpi, xxhdpi and adaptive variants
pub fn helloworld_table() -> Vec<u8> {
    TableBuilder::new(0x7f)
        .string(LABEL_ID, 0, Some("ko"), "안녕 세상")
        .string(LABEL_ID, 0, None, "Hello World")
        .string(ICON_ID, 0xfffe, None, ADAPTIVE_ICON)
        .string(ICON_ID, 160, None, MDPI_ICON)
        .string(ICON_ID, 480, None, XXHDPI_ICON)
        .build()
}

pub fn png(size: u32, color: [u8; 4]) -> Vec<u8> {
    let mut out = Cursor::new(Vec::new());
    DynamicImage::ImageRgba8(RgbaImage::from_pixel(size, size, Rgba(color)))
        .write_to(&mut out, ImageOutputFormat::Png)
        .unwrap();
    out.into_inner()
}

fn png_chunk(out: &mut Vec<u8>, ty: &[u8], data: &[u8]) {
    let mut crc = Crc::new();
    crc.update(ty);
    crc.update(data);
    out.extend_from_slice(&(data.len() as u32).to_be_bytes());
    out.extend_from_slice(ty);
    out.extend_from_slice(data);
    out.extend_from_slice(&crc.sum().to_be_bytes());
}

/// A single colour square as Xcode stores it in an app bundle
pub fn cgbi_png(size: u32, color: [u8; 4]) -> Vec<u8> {
    let a = color[3] as u32;
    let pre = |c: u8| ((c as u32 * a + 127) / 255) as u8;
    let mut raw = vec![];
    for _ in 0..size {
        raw.push(0);
        for _ in 0..size {
            raw.extend_from_slice(&[pre(color[2]), pre(color[1]), pre(color[0]), color[3]]);
        }
    }
    let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(&raw).unwrap();

    let mut ihdr = vec![];
    ihdr.extend_from_slice(&size.to_be_bytes());
    ihdr.extend_from_slice(&size.to_be_bytes());
    ihdr.extend_from_slice(&[8, 6, 0, 0, 0]);

    let mut out = vec![0x89, b'P', b'N', b'G', 0x0d, 0x0a, 0x1a, 0x0a];
    png_chunk(&mut out, b"CgBI", &[0x50, 0x00, 0x20, 0x06]);
    png_chunk(&mut out, b"IHDR", &ihdr);
    png_chunk(&mut out, b"IDAT", &encoder.finish().unwrap());
    png_chunk(&mut out, b"IEND", &[]);
    out
}

pub fn kthcorp_plist() -> Value {
    let mut primary = Dictionary::new();
    primary.insert(
        "CFBundleIconFiles".to_string(),
        Value::Array(vec!["AppIcon60x60".into()]),
    );
    let mut icons = Dictionary::new();
    icons.insert("CFBundlePrimaryIcon".to_string(), Value::Dictionary(primary));

    let mut dict = Dictionary::new();
    for (k, v) in [
        ("CFBundleName", "HelloWorld"),
        ("CFBundleIdentifier", "com.kthcorp.helloworld"),
        ("CFBundleShortVersionString", "1.0"),
        ("CFBundleVersion", "1.0"),
        ("CFBundleExecutable", "HelloWorld"),
        ("MinimumOSVersion", "9.0"),
    ] {
        dict.insert(k.to_string(), v.into());
    }
    dict.insert("CFBundleIcons".to_string(), Value::Dictionary(icons));
    Value::Dictionary(dict)
}

pub fn xml_plist(v: &Value) -> Vec<u8> {
    let mut out = vec![];
    v.to_writer_xml(&mut out).unwrap();
    out
}

pub fn binary_plist(v: &Value) -> Vec<u8> {
    let mut out = vec![];
    v.to_writer_binary(&mut out).unwrap();
    out
}

pub fn decode(png: &[u8]) -> RgbaImage {
    image::load_from_memory(png).unwrap().to_rgba8()
}
