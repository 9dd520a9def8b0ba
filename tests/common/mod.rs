#![allow(dead_code)]

use std::fs;
use std::path::Path;

use image::{DynamicImage, GrayImage, ImageFormat, Luma, Rgb, RgbImage};
use scanbatch::codec;
use scanbatch::record::tfrecord::TfRecordWriter;
use scanbatch::record::RawRecord;

/// A mostly white text line with a dark stroke across the middle.
pub fn text_line(width: u32, height: u32) -> DynamicImage {
    let mut img = GrayImage::from_pixel(width, height, Luma([235]));
    let y = height / 2;
    for x in width / 8..width - width / 8 {
        img.put_pixel(x, y, Luma([20]));
    }
    DynamicImage::ImageLuma8(img)
}

pub fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    codec::encode(&text_line(width, height), ImageFormat::Png).expect("encode png")
}

pub fn rgb_png_bytes(width: u32, height: u32) -> Vec<u8> {
    let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, Rgb([250, 240, 230])));
    codec::encode(&img, ImageFormat::Png).expect("encode png")
}

pub fn bmp_bytes(width: u32, height: u32) -> Vec<u8> {
    codec::encode(&text_line(width, height), ImageFormat::Bmp).expect("encode bmp")
}

pub fn write_png(path: &Path, width: u32, height: u32) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("create parent dir");
    }
    fs::write(path, png_bytes(width, height)).expect("write png file");
}

/// Writes `(width, label, comment)` records as PNG-backed TFRecord entries.
pub fn write_tfrecord(path: &Path, records: &[(u32, &str, &str)]) {
    let mut writer = TfRecordWriter::create(path).expect("create tfrecord");
    for (width, label, comment) in records {
        writer
            .write_record(&RawRecord::new(png_bytes(*width, 8), *label, *comment))
            .expect("write record");
    }
    writer.finish().expect("finish tfrecord");
}
