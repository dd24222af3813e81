use crate::base::{StorageScheme, PIVOT_TINY};
use crate::StrError;
use russell_lab::Vector;

/// Implements a global operator (mass, damping, or stiffness matrix)
///
/// The storage scheme is chosen once per analysis:
///
/// * `Full` — dense row-major, factorized by LU with partial pivoting
/// * `Band` — banded, factorized by LU without pivoting (fill-in is confined
///   to the band, so the semi-bandwidths never grow)
/// * `BandSymm` — lower band only, factorized by Cholesky
/// * `SymmPack` — packed lower triangle, factorized by Cholesky
///
/// Entries received by [`GlobalOperator::add`] outside the stored region are
/// rejected (out of band) or ignored (upper triangle of a symmetric scheme,
/// which the lower mirror already covers).
pub struct GlobalOperator {
    scheme: StorageScheme,
    n: usize,
    band_low: usize,
    band_up: usize,
    data: Vec<f64>,
    factor: Vec<f64>,
    pivot: Vec<usize>,
    factorized: bool,
    det_sign: f64,
}

impl GlobalOperator {
    /// Allocates a new (zeroed) instance
    ///
    /// The semi-bandwidths are only used by the banded schemes; symmetric
    /// banded storage keeps the larger of the two.
    pub fn new(scheme: StorageScheme, n: usize, band_low: usize, band_up: usize) -> Result<Self, StrError> {
        if n < 1 {
            return Err("the operator dimension must be at least 1");
        }
        let band_low = usize::min(band_low, n - 1);
        let band_up = usize::min(band_up, n - 1);
        let (band_low, band_up, len) = match scheme {
            StorageScheme::Full => (n - 1, n - 1, n * n),
            StorageScheme::Band => (band_low, band_up, (band_low + band_up + 1) * n),
            StorageScheme::BandSymm => {
                let band = usize::max(band_low, band_up);
                (band, band, (band + 1) * n)
            }
            StorageScheme::SymmPack => (n - 1, n - 1, n * (n + 1) / 2),
        };
        Ok(GlobalOperator {
            scheme,
            n,
            band_low,
            band_up,
            data: vec![0.0; len],
            factor: vec![0.0; len],
            pivot: vec![0; n],
            factorized: false,
            det_sign: 0.0,
        })
    }

    /// Returns the dimension of the operator
    pub fn dim(&self) -> usize {
        self.n
    }

    /// Returns the storage scheme
    pub fn scheme(&self) -> StorageScheme {
        self.scheme
    }

    /// Zeros all entries and invalidates the factorization
    pub fn zero(&mut self) {
        self.data.fill(0.0);
        self.factorized = false;
    }

    /// Returns whether the operator holds a valid factorization
    pub fn factorized(&self) -> bool {
        self.factorized
    }

    // storage slot of entry (i, j), already mirrored for symmetric schemes
    fn slot(&self, i: usize, j: usize) -> Option<usize> {
        match self.scheme {
            StorageScheme::Full => Some(i * self.n + j),
            StorageScheme::Band => {
                if (i > j && i - j > self.band_low) || (j > i && j - i > self.band_up) {
                    None
                } else {
                    Some((i + self.band_up - j) * self.n + j)
                }
            }
            StorageScheme::BandSymm => {
                let (i, j) = if i >= j { (i, j) } else { (j, i) };
                if i - j > self.band_low {
                    None
                } else {
                    Some((i - j) * self.n + j)
                }
            }
            StorageScheme::SymmPack => {
                let (i, j) = if i >= j { (i, j) } else { (j, i) };
                Some(j * self.n - j * (j.saturating_sub(1)) / 2 + (i - j))
            }
        }
    }

    /// Adds a value to entry (i, j) (scatter-add)
    ///
    /// Symmetric schemes store the lower triangle only; writes to the upper
    /// triangle are silently dropped because the mirrored lower write of a
    /// symmetric local block already carries the value.
    pub fn add(&mut self, i: usize, j: usize, value: f64) -> Result<(), StrError> {
        if i >= self.n || j >= self.n {
            return Err("DOF index is out of range of the operator");
        }
        if self.scheme.symmetric() && j > i {
            return Ok(());
        }
        match self.slot(i, j) {
            Some(s) => {
                self.data[s] += value;
                self.factorized = false;
                Ok(())
            }
            None => Err("entry falls outside of the band storage"),
        }
    }

    /// Returns entry (i, j) (zero outside the band, mirrored for symmetric schemes)
    pub fn get(&self, i: usize, j: usize) -> f64 {
        match self.slot(i, j) {
            Some(s) => self.data[s],
            None => 0.0,
        }
    }

    /// Computes `v = A · u`
    pub fn mul_vec(&self, v: &mut Vector, u: &Vector) -> Result<(), StrError> {
        if v.dim() != self.n || u.dim() != self.n {
            return Err("vector dimensions do not match the operator");
        }
        for i in 0..self.n {
            let first = i.saturating_sub(self.band_low);
            let last = usize::min(i + self.band_up, self.n - 1);
            let mut sum = 0.0;
            for j in first..=last {
                sum += self.get(i, j) * u[j];
            }
            v[i] = sum;
        }
        Ok(())
    }

    /// Multiplies all entries by a scalar
    pub fn scale(&mut self, alpha: f64) {
        for a in self.data.iter_mut() {
            *a *= alpha;
        }
        self.factorized = false;
    }

    /// Computes `self += alpha · other` (the layouts must match)
    pub fn add_scaled(&mut self, other: &GlobalOperator, alpha: f64) -> Result<(), StrError> {
        if self.scheme != other.scheme
            || self.n != other.n
            || self.band_low != other.band_low
            || self.band_up != other.band_up
        {
            return Err("the operators have incompatible layouts");
        }
        for (a, b) in self.data.iter_mut().zip(&other.data) {
            *a += alpha * b;
        }
        self.factorized = false;
        Ok(())
    }

    /// Copies the entries of another operator into this one (the layouts must match)
    pub fn copy_from(&mut self, other: &GlobalOperator) -> Result<(), StrError> {
        if self.scheme != other.scheme
            || self.n != other.n
            || self.band_low != other.band_low
            || self.band_up != other.band_up
        {
            return Err("the operators have incompatible layouts");
        }
        self.data.copy_from_slice(&other.data);
        self.factorized = false;
        Ok(())
    }

    /// Factorizes the operator (no-op if the factorization is still valid)
    ///
    /// Also records the sign of the determinant, available from
    /// [`GlobalOperator::det_sign`] afterwards.
    pub fn factorize(&mut self) -> Result<(), StrError> {
        if self.factorized {
            return Ok(());
        }
        self.factor.copy_from_slice(&self.data);
        match self.scheme {
            StorageScheme::Full => self.factorize_lu_full()?,
            StorageScheme::Band => self.factorize_lu_band()?,
            StorageScheme::BandSymm | StorageScheme::SymmPack => self.factorize_cholesky()?,
        }
        self.factorized = true;
        Ok(())
    }

    /// Solves `A · x = b`, factorizing first if needed
    pub fn solve(&mut self, x: &mut Vector, b: &Vector) -> Result<(), StrError> {
        self.factorize()?;
        self.solve_trs(x, b)
    }

    /// Solves `A · x = b` reusing the existing factorization
    pub fn solve_trs(&self, x: &mut Vector, b: &Vector) -> Result<(), StrError> {
        if !self.factorized {
            return Err("the operator has not been factorized yet");
        }
        if x.dim() != self.n || b.dim() != self.n {
            return Err("vector dimensions do not match the operator");
        }
        match self.scheme {
            StorageScheme::Full => self.solve_lu_full(x, b),
            StorageScheme::Band => self.solve_lu_band(x, b),
            StorageScheme::BandSymm | StorageScheme::SymmPack => self.solve_cholesky(x, b),
        }
        Ok(())
    }

    /// Returns the sign of the determinant recorded by the last factorization
    pub fn det_sign(&self) -> Result<f64, StrError> {
        if !self.factorized {
            return Err("the operator has not been factorized yet");
        }
        Ok(self.det_sign)
    }

    // ---------------------------------------------------------- full LU ----

    fn factorize_lu_full(&mut self) -> Result<(), StrError> {
        let n = self.n;
        let f = &mut self.factor;
        let mut sign = 1.0;
        for k in 0..n {
            let mut p = k;
            let mut big = f[k * n + k].abs();
            for i in (k + 1)..n {
                let v = f[i * n + k].abs();
                if v > big {
                    big = v;
                    p = i;
                }
            }
            if big < PIVOT_TINY {
                return Err("the operator matrix is singular");
            }
            self.pivot[k] = p;
            if p != k {
                for j in 0..n {
                    f.swap(k * n + j, p * n + j);
                }
                sign = -sign;
            }
            if f[k * n + k] < 0.0 {
                sign = -sign;
            }
            let pivot = f[k * n + k];
            for i in (k + 1)..n {
                let l = f[i * n + k] / pivot;
                f[i * n + k] = l;
                for j in (k + 1)..n {
                    f[i * n + j] -= l * f[k * n + j];
                }
            }
        }
        self.det_sign = sign;
        Ok(())
    }

    fn solve_lu_full(&self, x: &mut Vector, b: &Vector) {
        let n = self.n;
        let f = &self.factor;
        for i in 0..n {
            x[i] = b[i];
        }
        for k in 0..n {
            let p = self.pivot[k];
            if p != k {
                let t = x[k];
                x[k] = x[p];
                x[p] = t;
            }
        }
        for i in 0..n {
            let mut sum = x[i];
            for j in 0..i {
                sum -= f[i * n + j] * x[j];
            }
            x[i] = sum;
        }
        for i in (0..n).rev() {
            let mut sum = x[i];
            for j in (i + 1)..n {
                sum -= f[i * n + j] * x[j];
            }
            x[i] = sum / f[i * n + i];
        }
    }

    // -------------------------------------------------------- banded LU ----

    // index helper for the banded factor: entry (i, j) inside the band
    fn bs(&self, i: usize, j: usize) -> usize {
        (i + self.band_up - j) * self.n + j
    }

    fn factorize_lu_band(&mut self) -> Result<(), StrError> {
        let n = self.n;
        let mut sign = 1.0;
        for k in 0..n {
            let pivot = self.factor[self.bs(k, k)];
            if pivot.abs() < PIVOT_TINY {
                return Err("the operator matrix is singular");
            }
            if pivot < 0.0 {
                sign = -sign;
            }
            let i_last = usize::min(k + self.band_low, n - 1);
            let j_last = usize::min(k + self.band_up, n - 1);
            for i in (k + 1)..=i_last {
                let l = self.factor[self.bs(i, k)] / pivot;
                let s_ik = self.bs(i, k);
                self.factor[s_ik] = l;
                for j in (k + 1)..=j_last {
                    let s = self.bs(i, j);
                    self.factor[s] -= l * self.factor[self.bs(k, j)];
                }
            }
        }
        self.det_sign = sign;
        Ok(())
    }

    fn solve_lu_band(&self, x: &mut Vector, b: &Vector) {
        let n = self.n;
        for i in 0..n {
            let mut sum = b[i];
            for j in i.saturating_sub(self.band_low)..i {
                sum -= self.factor[self.bs(i, j)] * x[j];
            }
            x[i] = sum;
        }
        for i in (0..n).rev() {
            let mut sum = x[i];
            for j in (i + 1)..=usize::min(i + self.band_up, n - 1) {
                sum -= self.factor[self.bs(i, j)] * x[j];
            }
            x[i] = sum / self.factor[self.bs(i, i)];
        }
    }

    // ---------------------------------------------------------- Cholesky ----

    // index helper for the lower-triangular factor (i >= j)
    fn ls(&self, i: usize, j: usize) -> usize {
        match self.scheme {
            StorageScheme::BandSymm => (i - j) * self.n + j,
            _ => j * self.n - j * (j.saturating_sub(1)) / 2 + (i - j),
        }
    }

    fn factorize_cholesky(&mut self) -> Result<(), StrError> {
        let n = self.n;
        let band = self.band_low;
        for j in 0..n {
            let k_first = j.saturating_sub(band);
            let mut sum = self.factor[self.ls(j, j)];
            for k in k_first..j {
                let l = self.factor[self.ls(j, k)];
                sum -= l * l;
            }
            if sum < PIVOT_TINY {
                return Err("the operator matrix is not positive-definite");
            }
            let d = sum.sqrt();
            let s_jj = self.ls(j, j);
            self.factor[s_jj] = d;
            let i_last = usize::min(j + band, n - 1);
            for i in (j + 1)..=i_last {
                let k_first = usize::max(i.saturating_sub(band), j.saturating_sub(band));
                let mut sum = self.factor[self.ls(i, j)];
                for k in k_first..j {
                    sum -= self.factor[self.ls(i, k)] * self.factor[self.ls(j, k)];
                }
                let s_ij = self.ls(i, j);
                self.factor[s_ij] = sum / d;
            }
        }
        self.det_sign = 1.0;
        Ok(())
    }

    fn solve_cholesky(&self, x: &mut Vector, b: &Vector) {
        let n = self.n;
        let band = self.band_low;
        for i in 0..n {
            let mut sum = b[i];
            for j in i.saturating_sub(band)..i {
                sum -= self.factor[self.ls(i, j)] * x[j];
            }
            x[i] = sum / self.factor[self.ls(i, i)];
        }
        for i in (0..n).rev() {
            let mut sum = x[i];
            for j in (i + 1)..=usize::min(i + band, n - 1) {
                sum -= self.factor[self.ls(j, i)] * x[j];
            }
            x[i] = sum / self.factor[self.ls(i, i)];
        }
    }
}

/// Estimates the maximum eigenvalue of `Mass⁻¹ · Stiffness` by power iteration
///
/// Used to check the stability limit of the explicit integration scheme.
/// Returns zero for a vanishing stiffness (no limit applies).
pub fn estimate_max_eigenvalue(stiffness: &GlobalOperator, mass: &mut GlobalOperator) -> Result<f64, StrError> {
    let n = stiffness.dim();
    if mass.dim() != n {
        return Err("the operators have incompatible layouts");
    }
    mass.factorize()?;
    let mut x = Vector::filled(n, 1.0);
    let mut y = Vector::new(n);
    let mut lambda = 0.0;
    for _ in 0..100 {
        stiffness.mul_vec(&mut y, &x)?;
        mass.solve_trs(&mut x, &y)?;
        let norm = {
            let mut m: f64 = 0.0;
            for i in 0..n {
                m = f64::max(m, x[i].abs());
            }
            m
        };
        if norm < PIVOT_TINY {
            return Ok(0.0);
        }
        if !norm.is_finite() {
            return Err("the power iteration diverged");
        }
        for i in 0..n {
            x[i] /= norm;
        }
        if (norm - lambda).abs() <= 1e-6 * norm {
            return Ok(norm);
        }
        lambda = norm;
    }
    Ok(lambda)
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
