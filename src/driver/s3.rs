//! S3 buckets and objects.

use super::call::{self, set, CallSpec, DryRunMode, Output};
use super::{param_str, require, CallResult, Command, Ctx, DriverError};
use crate::binder::{Record, SetterKind as K, Shape, StructShape};
use crate::core::log::Logger;
use crate::core::types::{Action::*, Params, Value};
use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::Path;

static CREATE_BUCKET: StructShape =
    StructShape::new("CreateBucketInput", &[("Bucket", Shape::Str), ("ACL", Shape::Str)]);
static BUCKET: StructShape = StructShape::new("DeleteBucketInput", &[("Bucket", Shape::Str)]);
static PUT_OBJECT: StructShape = StructShape::new(
    "PutObjectInput",
    &[("Bucket", Shape::Str), ("Key", Shape::Str), ("ACL", Shape::Str)],
);
static OBJECT: StructShape =
    StructShape::new("DeleteObjectInput", &[("Bucket", Shape::Str), ("Key", Shape::Str)]);

const fn s3(
    operation: &'static str,
    input: &'static StructShape,
    required: &'static [call::Setter],
    extras: &'static [call::Setter],
    output: Output,
) -> CallSpec {
    CallSpec {
        service: "s3",
        operation,
        input,
        required,
        extras,
        output,
        dry_run: DryRunMode::Params,
    }
}

static CREATE_BUCKET_CALL: CallSpec = s3(
    "CreateBucket",
    &CREATE_BUCKET,
    &[set("name", "Bucket", K::Str)],
    &[set("acl", "ACL", K::Str)],
    Output::Param("name"),
);
static DELETE_BUCKET_CALL: CallSpec =
    s3("DeleteBucket", &BUCKET, &[set("name", "Bucket", K::Str)], &[], Output::Nothing);
static DELETE_OBJECT_CALL: CallSpec = s3(
    "DeleteObject",
    &OBJECT,
    &[set("bucket", "Bucket", K::Str), set("name", "Key", K::Str)],
    &[],
    Output::Nothing,
);

pub static COMMANDS: &[Command] = &[
    Command::spec(Create, "bucket", &CREATE_BUCKET_CALL),
    Command::spec(Delete, "bucket", &DELETE_BUCKET_CALL),
    Command::custom(Create, "s3object", create_s3object),
    Command::spec(Delete, "s3object", &DELETE_OBJECT_CALL),
];

/// Upload body reporting progress in 10% steps.
///
/// The body is read once for signing and once for sending; only reads
/// after the first rewind are reported.
pub struct ProgressReader<R> {
    inner: R,
    total: u64,
    read: u64,
    pass: u32,
    reported: u64,
    label: String,
    logger: Logger,
}

impl<R> ProgressReader<R> {
    pub fn new(inner: R, total: u64, label: &str, logger: Logger) -> Self {
        ProgressReader {
            inner,
            total,
            read: 0,
            pass: 1,
            reported: 0,
            label: label.to_string(),
            logger,
        }
    }
}

impl<R: Read> Read for ProgressReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.read += n as u64;
        if self.pass >= 2 && self.total > 0 {
            let decile = (self.read * 10 / self.total).min(10);
            if decile > self.reported {
                self.reported = decile;
                self.logger
                    .verbose(&format!("{}: {}%", self.label, decile * 10));
            }
        }
        Ok(n)
    }
}

impl<R: Seek> Seek for ProgressReader<R> {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let at = self.inner.seek(pos)?;
        if at == 0 {
            self.pass += 1;
            self.reported = 0;
        }
        self.read = at;
        Ok(at)
    }
}

/// Object key: `name` when given, else the file name.
fn object_key(params: &Params, file: &str) -> Result<String, DriverError> {
    if params.contains_key("name") {
        return param_str(params, "name");
    }
    Path::new(file)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .ok_or_else(|| DriverError::invalid("file", "file path", format!("no file name in '{}'", file)))
}

fn create_s3object(ctx: &Ctx<'_>, params: &Params) -> CallResult {
    require(params, &["bucket", "file"])?;
    let file = param_str(params, "file")?;
    let key = object_key(params, &file)?;
    let meta = std::fs::metadata(&file)
        .map_err(|e| DriverError::invalid("file", "file path", format!("{}: {}", file, e)))?;
    if ctx.dry_run {
        return ctx.dry_run_ok();
    }
    let bucket = param_str(params, "bucket")?;

    let mut input = Record::new(&PUT_OBJECT);
    input.put("Bucket", bucket.as_str(), K::Str)?;
    input.put("Key", key.as_str(), K::Str)?;
    if let Some(acl) = params.get("acl") {
        input.put("ACL", acl.clone(), K::Str)?;
    }

    ctx.logger
        .info(&format!("uploading {} to s3://{}/{}", file, bucket, key));
    let label = format!("s3://{}/{}", bucket, key);
    let mut body = ProgressReader::new(File::open(&file)?, meta.len(), &label, ctx.logger.clone());
    ctx.upload("s3", "PutObject", &input, &mut body)?;
    Ok(Some(Value::Str(key)))
}
