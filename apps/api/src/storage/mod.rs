use std::collections::HashMap;

use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client as S3Client;
use axum::extract::Multipart;
use bytes::Bytes;
use tracing::warn;
use uuid::Uuid;

use crate::errors::AppError;
use crate::validation::Validator;

pub const RESUME_MAX_BYTES: usize = 5 * 1024 * 1024;
pub const AVATAR_MAX_BYTES: usize = 2 * 1024 * 1024;

pub const RESUME_CONTENT_TYPES: [&str; 3] = [
    "application/pdf",
    "application/msword",
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
];

pub const AVATAR_CONTENT_TYPES: [&str; 3] = ["image/png", "image/jpeg", "image/gif"];

/// An uploaded file pulled out of a multipart request.
#[derive(Debug, Clone)]
pub struct Upload {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Bytes,
}

/// Text fields and file uploads pulled out of a multipart request body.
#[derive(Debug, Default)]
pub struct MultipartForm {
    fields: HashMap<String, String>,
    files: HashMap<String, Upload>,
}

impl MultipartForm {
    /// Text field value; blank submissions count as absent.
    pub fn text(&self, name: &str) -> Option<&str> {
        self.fields
            .get(name)
            .map(String::as_str)
            .filter(|v| !v.trim().is_empty())
    }

    pub fn file(&self, name: &str) -> Option<&Upload> {
        self.files.get(name)
    }
}

/// Drains a multipart body. Parts with a file name become uploads, the rest
/// become text fields.
pub async fn collect_multipart(mut multipart: Multipart) -> Result<MultipartForm, AppError> {
    let mut form = MultipartForm::default();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(format!("Invalid multipart body: {e}")))?
    {
        let Some(name) = field.name().map(str::to_string) else {
            continue;
        };
        if let Some(file_name) = field.file_name().map(sanitize_file_name) {
            let content_type = field
                .content_type()
                .unwrap_or("application/octet-stream")
                .to_string();
            let bytes = field
                .bytes()
                .await
                .map_err(|e| AppError::BadRequest(format!("Invalid multipart body: {e}")))?;
            form.files.insert(
                name,
                Upload {
                    file_name,
                    content_type,
                    bytes,
                },
            );
        } else {
            let value = field
                .text()
                .await
                .map_err(|e| AppError::BadRequest(format!("Invalid multipart body: {e}")))?;
            form.fields.insert(name, value);
        }
    }
    Ok(form)
}

/// Resume is required: must be a PDF/DOC/DOCX under 5 MiB.
pub fn validate_resume(v: &mut Validator, upload: Option<&Upload>) {
    let Some(upload) = upload else {
        v.add("Resume can't be blank");
        return;
    };
    if !RESUME_CONTENT_TYPES.contains(&upload.content_type.as_str()) {
        v.add("Resume content type is invalid");
    }
    if upload.bytes.len() > RESUME_MAX_BYTES {
        v.add("Resume file size must be less than 5 MB");
    }
}

/// Avatar is optional and dropped (not fatal) when invalid; returns the
/// reason so the caller can log it.
pub fn validate_avatar(upload: &Upload) -> Result<(), String> {
    if !AVATAR_CONTENT_TYPES.contains(&upload.content_type.as_str()) {
        return Err(format!("avatar content type {} is not allowed", upload.content_type));
    }
    if upload.bytes.len() > AVATAR_MAX_BYTES {
        return Err("avatar exceeds 2 MB".to_string());
    }
    Ok(())
}

/// Keeps only the final path component and replaces characters that would
/// break an S3 key or a Content-Disposition header.
pub fn sanitize_file_name(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name);
    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    if cleaned.trim_matches('_').is_empty() {
        "file".to_string()
    } else {
        cleaned
    }
}

pub fn resume_key(application_id: Uuid, file_name: &str) -> String {
    format!("resumes/{application_id}/{file_name}")
}

pub fn avatar_key(organization_id: Uuid, file_name: &str) -> String {
    format!("avatars/{organization_id}/{file_name}")
}

pub fn public_url(endpoint: &str, bucket: &str, key: &str) -> String {
    format!("{}/{bucket}/{key}", endpoint.trim_end_matches('/'))
}

pub async fn put_object(
    s3: &S3Client,
    bucket: &str,
    key: &str,
    upload: &Upload,
) -> Result<(), AppError> {
    s3.put_object()
        .bucket(bucket)
        .key(key)
        .body(ByteStream::from(upload.bytes.clone()))
        .content_type(&upload.content_type)
        .send()
        .await
        .map_err(|e| AppError::Storage(format!("upload of {key} failed: {e}")))?;
    Ok(())
}

/// Best-effort removal used when a later step of a request fails.
pub async fn delete_object(s3: &S3Client, bucket: &str, key: &str) {
    if let Err(e) = s3.delete_object().bucket(bucket).key(key).send().await {
        warn!("Orphaned object {key} left in {bucket}: {e}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn upload(content_type: &str, len: usize) -> Upload {
        Upload {
            file_name: "cv.pdf".to_string(),
            content_type: content_type.to_string(),
            bytes: Bytes::from(vec![0u8; len]),
        }
    }

    #[test]
    fn resume_is_required() {
        let mut v = Validator::new();
        validate_resume(&mut v, None);
        assert_eq!(
            v.finish().unwrap_err().to_string(),
            "Validation error: Resume can't be blank"
        );
    }

    #[test]
    fn resume_accepts_pdf_doc_docx() {
        for ct in RESUME_CONTENT_TYPES {
            let mut v = Validator::new();
            validate_resume(&mut v, Some(&upload(ct, 100)));
            assert!(v.finish().is_ok(), "{ct} should be accepted");
        }
    }

    #[test]
    fn resume_rejects_wrong_type_and_oversize() {
        let mut v = Validator::new();
        validate_resume(&mut v, Some(&upload("image/png", RESUME_MAX_BYTES + 1)));
        let msg = v.finish().unwrap_err().to_string();
        assert!(msg.contains("Resume content type is invalid"));
        assert!(msg.contains("Resume file size must be less than 5 MB"));
    }

    #[test]
    fn resume_at_exact_limit_passes() {
        let mut v = Validator::new();
        validate_resume(&mut v, Some(&upload("application/pdf", RESUME_MAX_BYTES)));
        assert!(v.finish().is_ok());
    }

    #[test]
    fn avatar_rules() {
        assert!(validate_avatar(&upload("image/png", 100)).is_ok());
        assert!(validate_avatar(&upload("application/pdf", 100)).is_err());
        assert!(validate_avatar(&upload("image/png", AVATAR_MAX_BYTES + 1)).is_err());
    }

    #[test]
    fn file_names_are_sanitized() {
        assert_eq!(sanitize_file_name("resume.pdf"), "resume.pdf");
        assert_eq!(sanitize_file_name("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_file_name("C:\\docs\\cv v2.docx"), "cv_v2.docx");
        assert_eq!(sanitize_file_name("???"), "file");
    }

    #[test]
    fn blank_text_fields_count_as_absent() {
        let mut form = MultipartForm::default();
        form.fields.insert("cover_letter".to_string(), "   ".to_string());
        form.fields
            .insert("applicant_fullname".to_string(), "Jane Doe".to_string());
        assert_eq!(form.text("cover_letter"), None);
        assert_eq!(form.text("applicant_fullname"), Some("Jane Doe"));
        assert_eq!(form.text("missing"), None);
    }

    #[test]
    fn url_joins_without_double_slash() {
        assert_eq!(
            public_url("http://minio:9000/", "uploads", "resumes/a/cv.pdf"),
            "http://minio:9000/uploads/resumes/a/cv.pdf"
        );
    }
}
