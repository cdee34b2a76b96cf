use std::fmt;

#[derive(Debug)]
pub(super) struct Chain<'a> {
    next: Option<&'a (dyn std::error::Error + 'static)>,
}

impl<'a> Chain<'a> {
    pub(super) fn new(head: &'a (dyn std::error::Error + 'static)) -> Self {
        Self { next: Some(head) }
    }
}

impl<'a> Iterator for Chain<'a> {
    type Item = &'a (dyn std::error::Error + 'static);

    fn next(&mut self) -> Option<Self::Item> {
        let error = self.next?;
        self.next = error.source();
        Some(error)
    }
}

/// Renders an error and all its sources on a single line.
///
/// Created by [`ErrorExt::display_chain`](super::ErrorExt::display_chain).
pub struct DisplayChain<'a> {
    head: &'a (dyn std::error::Error + 'static),
}

impl<'a> DisplayChain<'a> {
    pub(super) fn new(head: &'a (dyn std::error::Error + 'static)) -> Self {
        Self { head }
    }
}

impl fmt::Debug for DisplayChain<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl fmt::Display for DisplayChain<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (index, error) in Chain::new(self.head).enumerate() {
            if index > 0 {
                f.write_str(": ")?;
            }
            write!(f, "{error}")?;
        }
        Ok(())
    }
}
