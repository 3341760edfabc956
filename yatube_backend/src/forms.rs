use crate::database::models::GroupRecord;
use crate::error::{FieldErrors, ServiceResult};
use crate::posts::PostView;
use axum::http::HeaderValue;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

const REQUIRED: &str = "This field is required.";
const INVALID_CHOICE: &str =
    "Select a valid choice. That choice is not one of the available choices.";
const INVALID_IMAGE: &str =
    "Upload a valid image. The file you uploaded was either not an image or a corrupted image.";
const IMAGE_AND_CLEAR: &str =
    "Please either submit a file or check the clear checkbox, not both.";

/// A file part received with a post form, before it is checked.
#[derive(Debug, Clone, Default)]
pub struct UploadedImage {
    pub file_name: Option<String>,
    pub data: Vec<u8>,
}

/// An upload whose bytes sniffed as an image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidImage {
    pub data: Vec<u8>,
    pub mime: &'static str,
    pub extension: &'static str,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageChange {
    Keep,
    Replace(ValidImage),
    Clear,
}

/// The post create/edit form as submitted; also what the template re-renders
/// when validation fails.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PostForm {
    pub text: String,
    pub group: Option<String>,
    #[serde(skip)]
    pub image: Option<UploadedImage>,
    pub image_clear: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CleanPost {
    pub text: String,
    pub group_id: Option<i64>,
    pub image: ImageChange,
}

impl PostForm {
    pub fn from_fields(fields: &HashMap<String, String>, image: Option<UploadedImage>) -> Self {
        let group = fields
            .get("group")
            .map(|raw| raw.trim().to_string())
            .filter(|raw| !raw.is_empty());
        let image_clear = fields
            .get("image-clear")
            .is_some_and(|raw| matches!(raw.as_str(), "on" | "true" | "1"));
        Self {
            text: fields.get("text").cloned().unwrap_or_default(),
            group,
            // browsers send an empty, unnamed part when no file was chosen
            image: image.filter(|upload| !upload.data.is_empty()),
            image_clear,
        }
    }

    /// Pre-fills the form from an existing post for the edit page.
    pub fn for_post(post: &PostView) -> Self {
        Self {
            text: post.text.clone(),
            group: post.group.as_ref().map(|group| group.id.to_string()),
            image: None,
            image_clear: false,
        }
    }

    pub fn clean(&self, groups: &[GroupRecord]) -> ServiceResult<CleanPost> {
        let mut errors = FieldErrors::default();

        let text = self.text.trim().to_string();
        if text.is_empty() {
            errors.add("text", REQUIRED);
        }

        let group_id = match self.group.as_deref() {
            None => None,
            Some(raw) => {
                let found = raw
                    .parse::<i64>()
                    .ok()
                    .and_then(|id| groups.iter().find(|group| group.id == id));
                match found {
                    Some(group) => Some(group.id),
                    None => {
                        errors.add("group", INVALID_CHOICE);
                        None
                    }
                }
            }
        };

        let image = match (&self.image, self.image_clear) {
            (Some(_), true) => {
                errors.add("image", IMAGE_AND_CLEAR);
                ImageChange::Keep
            }
            (Some(upload), false) => match sniff_image(&upload.data) {
                Some(valid) => ImageChange::Replace(valid),
                None => {
                    errors.add("image", INVALID_IMAGE);
                    ImageChange::Keep
                }
            },
            (None, true) => ImageChange::Clear,
            (None, false) => ImageChange::Keep,
        };

        errors.into_result(CleanPost {
            text,
            group_id,
            image,
        })
    }
}

fn sniff_image(data: &[u8]) -> Option<ValidImage> {
    let kind = infer::get(data)?;
    if kind.matcher_type() != infer::MatcherType::Image {
        return None;
    }
    Some(ValidImage {
        data: data.to_vec(),
        mime: kind.mime_type(),
        extension: kind.extension(),
    })
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CommentForm {
    #[serde(default)]
    pub text: String,
}

impl CommentForm {
    pub fn clean(&self) -> ServiceResult<String> {
        let text = self.text.trim().to_string();
        if text.is_empty() {
            return FieldErrors::single("text", REQUIRED).into_result(text);
        }
        Ok(text)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoginForm {
    #[serde(default)]
    pub username: String,
    #[serde(default, skip_serializing)]
    pub password: String,
    #[serde(default)]
    pub next: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SignupForm {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default, skip_serializing)]
    pub password1: String,
    #[serde(default, skip_serializing)]
    pub password2: String,
}

impl SignupForm {
    /// Checks the password pair; the username is checked by the user service.
    pub fn clean_password(&self) -> ServiceResult<String> {
        let mut errors = FieldErrors::default();
        if self.password1.is_empty() {
            errors.add("password1", REQUIRED);
        } else if self.password1.chars().count() < 8 {
            errors.add(
                "password1",
                "This password is too short. It must contain at least 8 characters.",
            );
        } else if self.password1.chars().all(|c| c.is_ascii_digit()) {
            errors.add("password1", "This password is entirely numeric.");
        }
        if self.password1 != self.password2 {
            errors.add("password2", "The two password fields didn't match.");
        }
        errors.into_result(self.password1.clone())
    }
}

/// Only same-site absolute paths are honoured as a post-login destination.
/// The path must also be usable as a `Location` header value.
pub fn safe_next(next: Option<&str>) -> &str {
    match next {
        Some(path)
            if path.starts_with('/')
                && !path.starts_with("//")
                && HeaderValue::from_str(path).is_ok() =>
        {
            path
        }
        _ => "/",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ServiceError;

    const PNG_HEADER: &[u8] = &[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 0];

    fn groups() -> Vec<GroupRecord> {
        vec![GroupRecord {
            id: 7,
            title: "Business".into(),
            slug: "business".into(),
            description: String::new(),
        }]
    }

    fn form(text: &str, group: Option<&str>) -> PostForm {
        PostForm {
            text: text.into(),
            group: group.map(str::to_string),
            image: None,
            image_clear: false,
        }
    }

    fn field_errors(err: ServiceError) -> FieldErrors {
        match err {
            ServiceError::Validation(errors) => errors,
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn blank_text_is_required() {
        let errors = field_errors(form("   ", None).clean(&groups()).unwrap_err());
        assert_eq!(errors.get("text"), Some(&[REQUIRED.to_string()][..]));
    }

    #[test]
    fn group_must_be_a_known_id() {
        let clean = form("hello", Some("7")).clean(&groups()).unwrap();
        assert_eq!(clean.group_id, Some(7));
        let errors = field_errors(form("hello", Some("8")).clean(&groups()).unwrap_err());
        assert!(errors.get("group").is_some());
        let errors = field_errors(form("hello", Some("business")).clean(&groups()).unwrap_err());
        assert!(errors.get("group").is_some());
    }

    #[test]
    fn image_bytes_are_sniffed() {
        let mut post = form("with picture", None);
        post.image = Some(UploadedImage {
            file_name: Some("small.png".into()),
            data: PNG_HEADER.to_vec(),
        });
        let clean = post.clean(&groups()).unwrap();
        match clean.image {
            ImageChange::Replace(image) => {
                assert_eq!(image.extension, "png");
                assert_eq!(image.mime, "image/png");
            }
            other => panic!("unexpected image change {other:?}"),
        }

        post.image = Some(UploadedImage {
            file_name: Some("notes.png".into()),
            data: b"just some text".to_vec(),
        });
        let errors = field_errors(post.clean(&groups()).unwrap_err());
        assert_eq!(errors.get("image"), Some(&[INVALID_IMAGE.to_string()][..]));
    }

    #[test]
    fn clear_checkbox_conflicts_with_upload() {
        let mut post = form("text", None);
        post.image_clear = true;
        assert_eq!(post.clean(&groups()).unwrap().image, ImageChange::Clear);
        post.image = Some(UploadedImage {
            file_name: None,
            data: PNG_HEADER.to_vec(),
        });
        assert!(post.clean(&groups()).is_err());
    }

    #[test]
    fn empty_file_part_counts_as_no_upload() {
        let mut fields = HashMap::new();
        fields.insert("text".to_string(), "hi".to_string());
        fields.insert("group".to_string(), "".to_string());
        let parsed = PostForm::from_fields(&fields, Some(UploadedImage::default()));
        assert!(parsed.image.is_none());
        assert!(parsed.group.is_none());
    }

    #[test]
    fn signup_passwords_must_match_and_be_long_enough() {
        let mut signup = SignupForm {
            username: "leo".into(),
            password1: "12345678".into(),
            password2: "12345678".into(),
            ..Default::default()
        };
        assert!(signup.clean_password().is_err());
        signup.password1 = "correct horse".into();
        signup.password2 = "correct horse!".into();
        let errors = field_errors(signup.clean_password().unwrap_err());
        assert!(errors.get("password2").is_some());
        signup.password2 = "correct horse".into();
        assert_eq!(signup.clean_password().unwrap(), "correct horse");
    }

    #[test]
    fn next_must_stay_on_site() {
        assert_eq!(safe_next(Some("/new/")), "/new/");
        assert_eq!(safe_next(Some("//evil.example")), "/");
        assert_eq!(safe_next(Some("https://evil.example")), "/");
        assert_eq!(safe_next(None), "/");
        assert_eq!(safe_next(Some("/new/\u{7f}")), "/");
        assert_eq!(safe_next(Some("/follow/\r\nSet-Cookie: x=1")), "/");
    }
}
