use std::collections::BTreeSet;

/// Pages to prefetch around `current`, excluding the displayed pages.
///
/// In two-page view the step is a whole spread and each spread's right
/// page (`+1`) is included.
pub fn compute_window(
    current: usize,
    radius: usize,
    two_page: bool,
    page_count: usize,
) -> BTreeSet<usize> {
    let step = if two_page { 2 } else { 1 };
    let mut window = BTreeSet::new();

    let mut add = |page: usize| {
        if page < page_count {
            window.insert(page);
        }
        if two_page && page + 1 < page_count {
            window.insert(page + 1);
        }
    };

    for i in 1..=radius {
        add(current + step * i);
        if let Some(before) = current.checked_sub(step * i) {
            add(before);
        }
    }

    for page in displayed_pages(current, two_page, page_count) {
        window.remove(&page);
    }
    window
}

/// Pages on screen at `current`: one page, or the spread `current, current + 1`.
pub fn displayed_pages(current: usize, two_page: bool, page_count: usize) -> Vec<usize> {
    if current >= page_count {
        return Vec::new();
    }
    if two_page && current + 1 < page_count {
        vec![current, current + 1]
    } else {
        vec![current]
    }
}
