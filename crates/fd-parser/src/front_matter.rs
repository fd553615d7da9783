use serde::Deserialize;

/// Fields read from a YAML front-matter block.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct FrontMatter {
    pub title: Option<String>,
}

/// Input split into an optional `---` delimited front-matter payload and
/// the diagram body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct SplitInput<'a> {
    pub body: &'a str,
    pub payload: Option<&'a str>,
    /// 1-based line number where `body` starts.
    pub body_first_line: usize,
}

pub(crate) fn split_front_matter(input: &str) -> SplitInput<'_> {
    let unsplit = SplitInput {
        body: input,
        payload: None,
        body_first_line: 1,
    };

    // Leading blank lines before the opening fence are allowed.
    let mut offset = 0;
    let mut line_number = 1;
    let mut segments = input.split_inclusive('\n');
    let opening = loop {
        let Some(segment) = segments.next() else {
            return unsplit;
        };
        offset += segment.len();
        if segment.trim().is_empty() {
            line_number += 1;
            continue;
        }
        break segment;
    };
    if opening.trim() != "---" {
        return unsplit;
    }

    let payload_start = offset;
    for segment in segments {
        let segment_start = offset;
        offset += segment.len();
        line_number += 1;
        if segment.trim() == "---" {
            return SplitInput {
                body: &input[offset..],
                payload: Some(input[payload_start..segment_start].trim_matches(['\r', '\n'])),
                body_first_line: line_number + 1,
            };
        }
    }

    unsplit
}

pub(crate) fn parse_front_matter(payload: &str) -> Result<FrontMatter, serde_yaml::Error> {
    if payload.trim().is_empty() {
        return Ok(FrontMatter::default());
    }
    serde_yaml::from_str(payload)
}

#[cfg(test)]
mod tests {
    use super::{parse_front_matter, split_front_matter};

    #[test]
    fn splits_payload_and_body() {
        let input = "---\ntitle: Pets\n---\npie\n\"Dogs\" : 3\n";
        let split = split_front_matter(input);
        assert_eq!(split.payload, Some("title: Pets"));
        assert_eq!(split.body, "pie\n\"Dogs\" : 3\n");
        assert_eq!(split.body_first_line, 4);
    }

    #[test]
    fn unterminated_front_matter_is_left_alone() {
        let input = "---\ntitle: x\npie";
        let split = split_front_matter(input);
        assert_eq!(split.payload, None);
        assert_eq!(split.body, input);
    }

    #[test]
    fn input_without_fence_is_unchanged() {
        let split = split_front_matter("graph TD\nA-->B");
        assert_eq!(split.payload, None);
        assert_eq!(split.body_first_line, 1);
    }

    #[test]
    fn reads_title_and_ignores_other_keys() {
        let parsed = parse_front_matter("title: Roadmap\nconfig:\n  theme: dark");
        assert_eq!(parsed.ok().and_then(|fm| fm.title).as_deref(), Some("Roadmap"));
        assert!(parse_front_matter("title: [unclosed").is_err());
        assert!(parse_front_matter("").is_ok_and(|fm| fm.title.is_none()));
    }
}
