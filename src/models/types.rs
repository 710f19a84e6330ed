use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// 为封闭枚举生成字符串映射（数据库中以短字符串存储）
macro_rules! string_enum {
    (
        $(#[$meta:meta])*
        pub enum $name:ident { $($variant:ident => $text:literal),+ $(,)? }
    ) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(rename_all = "snake_case")]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = UnknownVariant;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok($name::$variant),)+
                    other => Err(UnknownVariant {
                        kind: stringify!($name),
                        value: other.to_string(),
                    }),
                }
            }
        }
    };
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind} value: {value}")]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

string_enum! {
    /// 资源文件类型，必须与 file_url 路径中的扩展名一致
    pub enum FileType {
        Pdf => "pdf",
        Doc => "doc",
        Docx => "docx",
        Ppt => "ppt",
        Pptx => "pptx",
        Jpg => "jpg",
        Png => "png",
        Mp4 => "mp4",
        Mp3 => "mp3",
        Txt => "txt",
        Zip => "zip",
    }
}

string_enum! {
    pub enum Category {
        LectureNotes => "lecture_notes",
        StudyGuide => "study_guide",
        PracticeProblems => "practice_problems",
        PastExam => "past_exam",
        Textbook => "textbook",
        Worksheet => "worksheet",
        VideoLecture => "video_lecture",
        Presentation => "presentation",
        Reference => "reference",
        Other => "other",
    }
}

string_enum! {
    pub enum GradeLevel {
        Elementary => "elementary",
        MiddleSchool => "middle_school",
        HighSchool => "high_school",
        Undergraduate => "undergraduate",
        Graduate => "graduate",
        Professional => "professional",
    }
}

string_enum! {
    /// 可见性级别，与审核状态相互独立
    pub enum AccessLevel {
        Public => "public",
        StudentsOnly => "students_only",
        TutorsOnly => "tutors_only",
        Premium => "premium",
    }
}

impl Default for AccessLevel {
    fn default() -> Self {
        AccessLevel::Public
    }
}

string_enum! {
    pub enum Role {
        Student => "student",
        Tutor => "tutor",
        Admin => "admin",
    }
}

impl Role {
    /// 教师与管理员属于提升角色
    pub fn is_elevated(&self) -> bool {
        matches!(self, Role::Tutor | Role::Admin)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_and_prints_stored_names() {
        assert_eq!("lecture_notes".parse::<Category>().unwrap(), Category::LectureNotes);
        assert_eq!(AccessLevel::TutorsOnly.to_string(), "tutors_only");
        assert_eq!(FileType::ALL.len(), 11);
        assert_eq!(Category::ALL.len(), 10);
        assert_eq!(GradeLevel::ALL.len(), 6);
    }

    #[test]
    fn rejects_unknown_names() {
        let err = "exe".parse::<FileType>().unwrap_err();
        assert_eq!(err.kind, "FileType");
        assert_eq!(err.value, "exe");
    }

    #[test]
    fn serde_uses_snake_case() {
        let json = serde_json::to_string(&GradeLevel::MiddleSchool).unwrap();
        assert_eq!(json, "\"middle_school\"");
        let level: AccessLevel = serde_json::from_str("\"students_only\"").unwrap();
        assert_eq!(level, AccessLevel::StudentsOnly);
    }
}
