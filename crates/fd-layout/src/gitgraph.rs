use fd_core::model::{GitGraphDiagram, GitOrientation};
use fd_core::{LayoutSettings, Size, TextMeasure, TextStyle, scale_to_fit};

const COMMIT_SPACING: f32 = 40.0;
const LANE_SPACING: f32 = 48.0;
const COMMIT_RADIUS: f32 = 10.0;
const LABEL_GAP: f32 = 12.0;

pub(crate) fn layout(
    git: &mut GitGraphDiagram,
    available_width: f32,
    measure: &dyn TextMeasure,
    settings: &LayoutSettings,
) -> (Size, f32) {
    if git.commits.is_empty() {
        return (Size::ZERO, 1.0);
    }
    let padding = settings.diagram_padding;

    // Display order: explicit `order:` first, then declaration lane.
    let mut order: Vec<usize> = (0..git.branches.len()).collect();
    order.sort_by_key(|index| {
        let branch = &git.branches[*index];
        (branch.order.unwrap_or(branch.lane as i64), branch.lane)
    });
    let mut slot_of_lane = vec![0_usize; git.branches.iter().map(|b| b.lane + 1).max().unwrap_or(0)];
    for (slot, index) in order.iter().enumerate() {
        slot_of_lane[git.branches[*index].lane] = slot;
    }
    let lanes = order.len().max(1);

    let name_size = git
        .branches
        .iter()
        .map(|branch| measure.measure(&branch.name, &TextStyle::SMALL))
        .fold(Size::ZERO, |acc, size| {
            Size::new(acc.width.max(size.width), acc.height.max(size.height))
        });
    let message_height = measure.line_height(&TextStyle::SMALL);
    let last_seq = git.commits.iter().map(|commit| commit.seq).max().unwrap_or(0);
    let along_extent = last_seq as f32 * COMMIT_SPACING + COMMIT_RADIUS * 2.0;
    let across_extent = (lanes - 1) as f32 * LANE_SPACING + COMMIT_RADIUS * 2.0;

    let (natural, along_origin, across_origin) = match git.orientation {
        GitOrientation::LeftToRight => {
            let gutter = name_size.width + LABEL_GAP;
            (
                Size::new(
                    padding * 2.0 + gutter + along_extent,
                    padding * 2.0 + across_extent + message_height + LABEL_GAP,
                ),
                padding + gutter + COMMIT_RADIUS,
                padding + COMMIT_RADIUS,
            )
        }
        GitOrientation::TopToBottom | GitOrientation::BottomToTop => {
            let header = name_size.height + LABEL_GAP;
            let lane_width = LANE_SPACING.max(name_size.width + LABEL_GAP);
            (
                Size::new(
                    padding * 2.0 + (lanes - 1) as f32 * lane_width + name_size.width.max(COMMIT_RADIUS * 2.0),
                    padding * 2.0 + header + along_extent,
                ),
                padding + header + COMMIT_RADIUS,
                padding + name_size.width.max(COMMIT_RADIUS * 2.0) / 2.0,
            )
        }
    };
    let lane_step = match git.orientation {
        GitOrientation::LeftToRight => LANE_SPACING,
        _ => LANE_SPACING.max(name_size.width + LABEL_GAP),
    };

    let scale = scale_to_fit(natural.width, available_width);
    for branch in &mut git.branches {
        let slot = slot_of_lane.get(branch.lane).copied().unwrap_or(0);
        branch.position = (across_origin + slot as f32 * lane_step) * scale;
    }
    for commit in &mut git.commits {
        let slot = slot_of_lane.get(commit.lane).copied().unwrap_or(0);
        let across = across_origin + slot as f32 * lane_step;
        let steps = match git.orientation {
            GitOrientation::BottomToTop => last_seq - commit.seq,
            _ => commit.seq,
        };
        let along = along_origin + steps as f32 * COMMIT_SPACING;
        let (x, y) = match git.orientation {
            GitOrientation::LeftToRight => (along, across),
            _ => (across, along),
        };
        commit.x = x * scale;
        commit.y = y * scale;
    }
    (natural.scaled(scale), scale)
}

#[cfg(test)]
mod tests {
    use fd_core::model::GitGraphDiagram;
    use fd_core::{Diagram, FontMetrics, LayoutSettings};

    use super::layout;
    use crate::tests::parsed;

    fn git(input: &str) -> GitGraphDiagram {
        match parsed(input) {
            Diagram::GitGraph(git) => git,
            other => panic!("expected gitGraph, got {:?}", other.family()),
        }
    }

    const HISTORY: &str = "commit\nbranch dev\ncommit\ncommit\ncheckout main\nmerge dev";

    #[test]
    fn left_to_right_maps_sequence_to_x() {
        let mut graph = git(&format!("gitGraph\n{HISTORY}"));
        layout(&mut graph, f32::INFINITY, &FontMetrics::default(), &LayoutSettings::default());
        let xs: Vec<f32> = graph.commits.iter().map(|commit| commit.x).collect();
        assert!(xs.windows(2).all(|pair| pair[0] < pair[1]));
        let main = graph.branch("main").expect("main").position;
        let dev = graph.branch("dev").expect("dev").position;
        assert!(dev > main);
        assert_eq!(graph.commits[1].y, dev);
        assert_eq!(graph.commits[3].y, main);
    }

    #[test]
    fn vertical_orientations_swap_axes() {
        let mut down = git(&format!("gitGraph TB:\n{HISTORY}"));
        layout(&mut down, f32::INFINITY, &FontMetrics::default(), &LayoutSettings::default());
        assert!(down.commits.windows(2).all(|pair| pair[0].y < pair[1].y));
        assert!(down.commits[1].x > down.commits[0].x);

        let mut up = git(&format!("gitGraph BT:\n{HISTORY}"));
        layout(&mut up, f32::INFINITY, &FontMetrics::default(), &LayoutSettings::default());
        assert!(up.commits.windows(2).all(|pair| pair[0].y > pair[1].y));
    }

    #[test]
    fn branch_order_overrides_declaration() {
        let mut graph = git("gitGraph\ncommit\nbranch late\ncommit\nbranch early order: -1\ncommit");
        layout(&mut graph, f32::INFINITY, &FontMetrics::default(), &LayoutSettings::default());
        let early = graph.branch("early").expect("early").position;
        let main = graph.branch("main").expect("main").position;
        let late = graph.branch("late").expect("late").position;
        assert!(early < main && main < late);
    }

    #[test]
    fn long_histories_scale_uniformly() {
        let mut source = String::from("gitGraph\n");
        for _ in 0..60 {
            source.push_str("commit\n");
        }
        let mut graph = git(&source);
        let (size, scale) =
            layout(&mut graph, 500.0, &FontMetrics::default(), &LayoutSettings::default());
        assert!(scale < 1.0);
        assert!(size.width <= 500.0 + 0.01);
        assert!(graph.commits.iter().all(|commit| commit.x <= 500.0));
    }
}
