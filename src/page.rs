use snafu::ensure;

use crate::{
    error::{PageOutOfRangeSnafu, PayloadTooLongSnafu},
    Connect, Error, FrameMode, FrameWriter, PAGE_COUNT, PAGE_SIZE,
};

/// Fill byte of a cleared page.
pub const BLANK: u8 = b' ';

/// One page of display content.
pub type Page = [u8; PAGE_SIZE];

/// The display pages and the cursor selecting the one shown.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PageBuffer {
    pages: [Page; PAGE_COUNT],
    current: usize,
}

impl PageBuffer {
    /// Creates a buffer with all pages blank and the first one selected.
    pub const fn new() -> Self {
        Self {
            pages: [[BLANK; PAGE_SIZE]; PAGE_COUNT],
            current: 0,
        }
    }

    pub fn current(&self) -> usize {
        self.current
    }

    pub fn current_page(&self) -> &Page {
        &self.pages[self.current]
    }

    pub fn page(&self, index: usize) -> Option<&Page> {
        self.pages.get(index)
    }

    pub fn clear_page(&mut self, index: usize) -> Result<(), Error> {
        self.page_mut(index)?.fill(BLANK);
        Ok(())
    }

    /// Replaces the content of a page. Bytes past the end of `data` are blank.
    pub fn update_page(&mut self, index: usize, data: &[u8]) -> Result<(), Error> {
        ensure!(data.len() <= PAGE_SIZE, PayloadTooLongSnafu { len: data.len() });

        let page = self.page_mut(index)?;
        page.fill(BLANK);
        page[..data.len()].copy_from_slice(data);
        Ok(())
    }

    pub fn show_page(&mut self, index: usize) -> Result<(), Error> {
        ensure!(index < PAGE_COUNT, PageOutOfRangeSnafu { index });
        self.current = index;
        Ok(())
    }

    /// Advances the cursor to the next page, wrapping around. Returns the new index.
    pub fn cycle(&mut self) -> usize {
        self.current = (self.current + 1) % PAGE_COUNT;
        self.current
    }

    /// Clears the display and draws the current page.
    ///
    /// A failure leaves the pages untouched.
    pub fn redraw<C: Connect>(&self, writer: &mut FrameWriter<'_, C>) -> Result<(), Error> {
        writer.clear()?;
        writer.write_framed(self.current_page(), FrameMode::WritePage)
    }

    fn page_mut(&mut self, index: usize) -> Result<&mut Page, Error> {
        self.pages
            .get_mut(index)
            .ok_or(Error::PageOutOfRange { index })
    }
}

impl Default for PageBuffer {
    fn default() -> Self {
        Self::new()
    }
}
